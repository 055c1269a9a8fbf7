//! PDF renderer – takes a [`DocumentLayout`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API), adding the decorations repeated on every
//! page: logo, user header and footer.

use std::collections::HashMap;
use std::path::PathBuf;

use printpdf::*;

use crate::error::{ExportError, Result};
use crate::fonts::FontManager;
use crate::layout_config::*;
use crate::writer::attachments::load_image_source;

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Header and footer content of one batch document.
#[derive(Debug, Clone)]
pub struct PageDecorations {
    /// Printed right-aligned in the footer.
    pub heading: String,
    /// Printed top-right; omitted when no user is known.
    pub user_name: Option<String>,
    /// Printed left in the footer.
    pub date: String,
    /// Pages rendered by earlier batches; footer numbers continue after it.
    pub page_offset: usize,
    pub logo_path: Option<PathBuf>,
    pub logo_height: f32,
    pub page_header_top: f32,
    pub page_footer_top: f32,
    pub header_size: f32,
    pub footer_size: f32,
}

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Font used for all text of the document.
enum TextFont {
    /// Builtin Helvetica; text goes through WinAnsi encoding.
    Builtin,
    Embedded(FontId),
}

struct RenderContext<'a> {
    page_height: f32,
    images: HashMap<String, ImageResource>,
    font: TextFont,
    fonts: &'a FontManager,
}

/// Render a laid-out batch into PDF bytes.
///
/// Images that cannot be read or decoded are skipped with a `log::warn`.
pub fn render_document(
    layout: &DocumentLayout,
    decorations: &PageDecorations,
    fonts: &FontManager,
) -> Result<Vec<u8>> {
    let page_w = Mm(layout.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(layout.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&layout.title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    let font = match fonts.font_bytes() {
        Some(bytes) => {
            let parsed = ParsedFont::from_bytes(bytes, 0, &mut warnings).ok_or_else(|| {
                ExportError::Render("configured font cannot be embedded".to_string())
            })?;
            TextFont::Embedded(doc.add_font(&parsed))
        }
        None => TextFont::Builtin,
    };

    // ── Pre-register all images ────────────────────────────────────────────
    let mut srcs: Vec<&str> = layout
        .boxes()
        .filter_map(|b| b.image.as_ref())
        .map(|img| img.src.as_str())
        .collect();
    let logo_src = decorations
        .logo_path
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    if let Some(logo) = &logo_src {
        srcs.push(logo.as_str());
    }

    let mut images: HashMap<String, ImageResource> = HashMap::new();
    for src in srcs {
        if images.contains_key(src) {
            continue;
        }
        let bytes = match load_image_source(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image, PDF encode error: {e}");
                continue;
            }
        };
        let (px_width, px_height) = (raw.width as u32, raw.height as u32);
        let xobj_id = doc.add_image(&raw);
        images.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }

    let ctx = RenderContext {
        page_height: layout.page_height_pt,
        images,
        font,
        fonts,
    };

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages = Vec::with_capacity(layout.pages.len());
    for page_layout in &layout.pages {
        let mut ops = Vec::new();
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, &ctx);
        }
        render_decorations(
            &mut ops,
            layout,
            decorations,
            page_layout.page_index,
            logo_src.as_deref(),
            &ctx,
        );
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    // Builtin-font text is written as raw `Tj` operations, which the secure
    // mode would drop.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    let bytes = doc.save(&options, &mut warnings);
    for w in &warnings {
        log::debug!("printpdf: {w:?}");
    }
    Ok(bytes)
}

/// Logo top-left, user name top-right, date / page number / heading below
/// the content area.
fn render_decorations(
    ops: &mut Vec<Op>,
    layout: &DocumentLayout,
    deco: &PageDecorations,
    page_index: usize,
    logo_src: Option<&str>,
    ctx: &RenderContext<'_>,
) {
    let m = &layout.margins;
    let content_top = layout.page_height_pt - m.top;
    let left = m.left;
    let right = layout.page_width_pt - m.right;

    if let Some(res) = logo_src.and_then(|src| ctx.images.get(src)) {
        let scale = if res.px_height > 0 {
            (deco.logo_height / res.px_height as f32).min(1.0)
        } else {
            1.0
        };
        let top = content_top + deco.page_header_top + deco.logo_height / 2.0;
        ops.push(Op::UseXobject {
            id: res.xobj_id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(left)),
                translate_y: Some(Pt(top - res.px_height as f32 * scale)),
                dpi: Some(72.0),
                scale_x: Some(scale),
                scale_y: Some(scale),
                rotate: None,
            },
        });
    }

    if let Some(user) = &deco.user_name {
        let w = ctx.fonts.measure_text_width(user, deco.header_size, false);
        push_text(
            ops,
            ctx,
            user,
            right - w,
            content_top + deco.logo_height,
            deco.header_size,
            false,
            BLACK,
        );
    }

    let footer_y = m.bottom - deco.page_footer_top;
    let size = deco.footer_size;
    let page_string = page_number(page_index, deco.page_offset);
    let page_w = ctx.fonts.measure_text_width(&page_string, size, false);
    let heading_w = ctx.fonts.measure_text_width(&deco.heading, size, false);
    let content_width = right - left;

    push_text(ops, ctx, &deco.date, left, footer_y, size, false, BLACK);
    push_text(
        ops,
        ctx,
        &page_string,
        left + (content_width - page_w) / 2.0,
        footer_y,
        size,
        false,
        BLACK,
    );
    push_text(ops, ctx, &deco.heading, right - heading_w, footer_y, size, false, BLACK);
}

/// Footer label of the page at `page_index` of a batch.
fn page_number(page_index: usize, page_offset: usize) -> String {
    (page_index + 1 + page_offset).to_string()
}

/// Write one line of text with its baseline at `(x, y)` in PDF coordinates.
#[allow(clippy::too_many_arguments)]
fn push_text(
    ops: &mut Vec<Op>,
    ctx: &RenderContext<'_>,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
    bold: bool,
    color: [f32; 4],
) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFillColor { col: rgb(color) });
    match &ctx.font {
        TextFont::Builtin => {
            let font = if bold {
                BuiltinFont::HelveticaBold
            } else {
                BuiltinFont::Helvetica
            };
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font,
            });
            // Empty write registers the font resource; the glyphs follow as
            // raw WinAnsi bytes.
            ops.push(Op::WriteTextBuiltinFont {
                items: Vec::new(),
                font,
            });
            ops.push(Op::Unknown {
                key: "Tj".to_string(),
                value: vec![DictItem::String {
                    data: to_winansi(text),
                    literal: true,
                }],
            });
        }
        TextFont::Embedded(font_id) => {
            ops.push(Op::SetFontSize {
                size: Pt(size),
                font: font_id.clone(),
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(text.to_string())],
                font: font_id.clone(),
            });
        }
    }
    ops.push(Op::EndTextSection);
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn rect_points(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    [(x1, y1), (x2, y1), (x2, y2), (x1, y2)]
        .into_iter()
        .map(|(x, y)| LinePoint {
            p: Point { x: Pt(x), y: Pt(y) },
            bezier: false,
        })
        .collect()
}

/// Encode text as Windows-1252 bytes for the builtin fonts, which use
/// WinAnsiEncoding. Characters without a code point there become `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85, // ellipsis
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99, // trademark
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            '\u{00A0}' => b' ',
            // U+0080-U+009F are control characters without a WinAnsi glyph.
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, ctx: &RenderContext<'_>) {
    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = ctx.page_height - lbox.y;
    let (x1, y1, x2, y2) = (lbox.x, pdf_y - lbox.height, lbox.x + lbox.width, pdf_y);

    if let Some(bg) = &lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(*bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: rect_points(x1, y1, x2, y2),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: rect_points(x1, y1, x2, y2),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        let ascender = ctx.fonts.ascender(text.font_size);
        for tline in text.lines.iter().filter(|l| !l.text.is_empty()) {
            push_text(
                ops,
                ctx,
                &tline.text,
                lbox.x + tline.x_offset,
                pdf_y - tline.y_offset - ascender,
                text.font_size,
                text.bold,
                text.color,
            );
        }
    }

    // Image – embed from pre-registered XObject
    if let Some(img) = &lbox.image {
        if let Some(res) = ctx.images.get(&img.src) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                img.width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                img.height / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(pdf_y - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, PageSetup};
    use crate::config::ExportConfig;
    use crate::i18n::Locale;
    use crate::model::ExportOptions;

    fn decorations(page_offset: usize) -> PageDecorations {
        PageDecorations {
            heading: "Work packages".into(),
            user_name: Some("Ada Lovelace".into()),
            date: "01/02/2024".into(),
            page_offset,
            logo_path: None,
            logo_height: 20.0,
            page_header_top: 20.0,
            page_footer_top: 30.0,
            header_size: 8.0,
            footer_size: 8.0,
        }
    }

    fn empty_layout() -> DocumentLayout {
        let setup = PageSetup::for_export(
            &ExportOptions::default(),
            Locale::En,
            &ExportConfig::default(),
        );
        Canvas::new(setup).into_layout()
    }

    /// Operands of every `Tj` on the first page.
    fn shown_strings(pdf: &[u8]) -> Vec<Vec<u8>> {
        let doc = lopdf::Document::load_mem(pdf).unwrap();
        let page = *doc.get_pages().values().next().unwrap();
        doc.get_and_decode_page_content(page)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .flat_map(|op| op.operands)
            .filter_map(|operand| match operand {
                lopdf::Object::String(bytes, _) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn render_empty_page() {
        let bytes =
            render_document(&empty_layout(), &decorations(0), &FontManager::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        // PDF magic number
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn missing_images_and_logo_are_skipped() {
        let mut layout = empty_layout();
        let mut lbox = LayoutBox::new(36.0, 60.0, 100.0, 50.0);
        lbox.image = Some(ImageContent {
            src: "/nonexistent/image.png".into(),
            width: 100.0,
            height: 50.0,
            px_width: 200,
            px_height: 100,
        });
        layout.pages[0].boxes.push(lbox);
        let mut deco = decorations(3);
        deco.logo_path = Some(PathBuf::from("/nonexistent/logo.png"));
        let bytes = render_document(&layout, &deco, &FontManager::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn winansi_uses_one_byte_per_character() {
        assert_eq!(to_winansi("€ Ä ✓"), vec![0x80, b' ', 0xC4, b' ', b'?']);
        assert_eq!(to_winansi("\u{201C}ß\u{201D}\u{2013}"), vec![0x93, 0xDF, 0x94, 0x96]);
        assert_eq!(to_winansi("\u{0085}"), vec![b'?']);
    }

    #[test]
    fn umlauts_reach_the_content_stream_as_winansi() {
        let mut layout = empty_layout();
        layout.pages[0].boxes.push(LayoutBox::text(
            36.0,
            60.0,
            300.0,
            &["Übersicht Größe".to_string()],
            9.0,
            false,
            12.0,
        ));
        let mut deco = decorations(0);
        deco.heading = "Anhänge".into();
        let bytes = render_document(&layout, &deco, &FontManager::default()).unwrap();

        let shown = shown_strings(&bytes);
        let body = shown.iter().find(|s| s.first() == Some(&0xDC)).unwrap();
        assert_eq!(body, b"\xDCbersicht Gr\xF6\xDFe");
        assert!(shown.iter().any(|s| s == b"Anh\xE4nge"));
        assert!(shown.iter().flatten().all(|&b| b != 0xC3), "UTF-8 lead byte leaked");
    }

    #[test]
    fn footer_numbers_continue_after_offset() {
        assert_eq!(page_number(0, 0), "1");
        assert_eq!(page_number(2, 10), "13");
    }
}
