//! Merging of per-batch PDF files into the final document.
//!
//! Pages are imported in batch order into one new page tree. Link
//! annotations that point at pages of another batch cannot exist, and
//! internal link targets are not carried over.

use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::batch::IntermediateFile;
use crate::error::{ExportError, Result};

/// Combine the batch files into one document.
///
/// A single file is returned untouched. Otherwise the merged document is
/// written to a new temporary file in `dir`; the batch files are deleted
/// once consumed. On error nothing is left behind.
pub fn merge_batches(
    files: Vec<IntermediateFile>,
    dir: &Path,
    filename: &str,
) -> Result<IntermediateFile> {
    let expected: usize = files.iter().map(IntermediateFile::page_count).sum();
    let mut files = files;
    match files.len() {
        0 => return Err(ExportError::Merge("no batch files to merge".into())),
        1 => return Ok(files.remove(0)),
        _ => {}
    }

    let documents = files
        .iter()
        .map(|f| {
            Document::load(f.path()).map_err(|e| {
                ExportError::Merge(format!("cannot open {}: {e}", f.path().display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut merged = merge_documents(documents)?;
    let actual = merged.get_pages().len();
    if actual != expected {
        return Err(ExportError::PageCountMismatch { expected, actual });
    }

    merged.prune_objects();
    merged.compress();

    let mut out = tempfile::Builder::new()
        .prefix(filename)
        .suffix(".pdf")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(out.as_file_mut());
        merged
            .save_to(&mut writer)
            .map_err(|e| ExportError::Merge(format!("cannot write merged file: {e}")))?;
        writer
            .flush()
            .map_err(|e| ExportError::Merge(format!("cannot write merged file: {e}")))?;
    }
    log::debug!("Merged {} batch files into {actual} pages", files.len());

    for file in files {
        let path = file.path().to_path_buf();
        if let Err(e) = file.into_temp_path().close() {
            log::warn!("Could not remove batch file {}: {e}", path.display());
        }
    }
    Ok(IntermediateFile::from_temp_path(out.into_temp_path(), actual))
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Import the pages of every document, in order, into one new document.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut target = Document::with_version("1.5");
    let mut catalog_id: Option<ObjectId> = None;
    let mut pages_id: Option<ObjectId> = None;

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        let doc_pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        // Page tree nodes of all but the first document are dropped below.
        inline_inherited_attributes(&mut doc, &doc_pages);
        page_ids.extend(doc_pages);

        for (object_id, object) in doc.objects {
            let type_name = object.type_name().map(str::to_owned).unwrap_or_default();
            match type_name.as_str() {
                "Catalog" => {
                    if catalog_id.is_none() {
                        catalog_id = Some(object_id);
                        target.objects.insert(object_id, object);
                    }
                }
                "Pages" => {
                    if pages_id.is_none() {
                        pages_id = Some(object_id);
                        target.objects.insert(object_id, object);
                    }
                }
                "Outlines" | "Outline" => {}
                _ => {
                    target.objects.insert(object_id, object);
                }
            }
        }
    }

    let catalog_id =
        catalog_id.ok_or_else(|| ExportError::Merge("no document catalog found".into()))?;
    let pages_id = pages_id.ok_or_else(|| ExportError::Merge("no page tree found".into()))?;

    for page_id in &page_ids {
        let page = target
            .objects
            .get_mut(page_id)
            .and_then(|o| o.as_dict_mut().ok())
            .ok_or_else(|| ExportError::Merge(format!("page {page_id:?} is missing")))?;
        page.set("Parent", Object::Reference(pages_id));
    }

    let mut pages = match target.objects.get(&pages_id) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(page_ids.len() as i64));
    pages.set(
        "Kids",
        Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
    );
    target.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = match target.objects.get(&catalog_id) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    catalog.set("Pages", Object::Reference(pages_id));
    catalog.remove(b"Outlines");
    target
        .objects
        .insert(catalog_id, Object::Dictionary(catalog));

    target.trailer.set("Root", Object::Reference(catalog_id));
    target.max_id = target.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    target.renumber_objects();
    Ok(target)
}

/// Copy attributes a page inherits from its page tree ancestors onto the
/// page itself.
fn inline_inherited_attributes(doc: &mut Document, page_ids: &[ObjectId]) {
    for &page_id in page_ids {
        let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();
        if let Ok(page) = doc.get_dictionary(page_id) {
            let mut missing: Vec<&[u8]> =
                INHERITABLE.iter().copied().filter(|key| !page.has(key)).collect();
            let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
            // Depth bound guards against cyclic trees.
            for _ in 0..32 {
                let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
                    break;
                };
                if missing.is_empty() {
                    break;
                }
                missing.retain(|key| match node.get(key) {
                    Ok(value) => {
                        inherited.push((key.to_vec(), value.clone()));
                        false
                    }
                    Err(_) => true,
                });
                parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            }
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// A minimal document whose pages carry a `/Marker` entry.
    fn document_with_pages(markers: &[i64]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for marker in markers {
            let content = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 522.into(), 756.into()],
                "Contents" => content,
                "Marker" => *marker,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn markers(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|id| {
                doc.get_object(*id)
                    .and_then(Object::as_dict)
                    .and_then(|d| d.get(b"Marker"))
                    .and_then(Object::as_i64)
                    .unwrap()
            })
            .collect()
    }

    fn write_batch(doc: &mut Document, dir: &Path, pages: usize) -> IntermediateFile {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        IntermediateFile::write(&bytes, pages, dir, "pdf_batch_").unwrap()
    }

    #[test]
    fn merged_pages_keep_batch_order() {
        let merged = merge_documents(vec![
            document_with_pages(&[1, 2]),
            document_with_pages(&[3]),
            document_with_pages(&[4, 5, 6]),
        ])
        .unwrap();
        assert_eq!(markers(&merged), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn inherited_media_box_moves_onto_pages() {
        let mut second = document_with_pages(&[2]);
        let page_id = *second.get_pages().values().next().unwrap();
        let pages_id = second
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .and_then(Object::as_reference)
            .unwrap();
        second
            .get_dictionary_mut(page_id)
            .unwrap()
            .remove(b"MediaBox");
        second
            .get_dictionary_mut(pages_id)
            .unwrap()
            .set("MediaBox", vec![0.into(), 0.into(), 100.into(), 200.into()]);

        let merged = merge_documents(vec![document_with_pages(&[1]), second]).unwrap();
        let last = *merged.get_pages().values().last().unwrap();
        let media_box = merged
            .get_dictionary(last)
            .unwrap()
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .unwrap();
        assert_eq!(media_box[3].as_i64().unwrap(), 200);
    }

    #[test]
    fn merge_batches_writes_one_file_and_removes_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_batch(&mut document_with_pages(&[1, 2]), dir.path(), 2);
        let b = write_batch(&mut document_with_pages(&[3, 4, 5]), dir.path(), 3);
        let inputs = [a.path().to_path_buf(), b.path().to_path_buf()];

        let merged = merge_batches(vec![a, b], dir.path(), "pdf_export").unwrap();
        assert_eq!(merged.page_count(), 5);
        assert!(inputs.iter().all(|p| !p.exists()));

        let doc = Document::load(merged.path()).unwrap();
        assert_eq!(markers(&doc), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn single_file_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let only = write_batch(&mut document_with_pages(&[7]), dir.path(), 1);
        let path = only.path().to_path_buf();
        let before = std::fs::read(&path).unwrap();
        let out = merge_batches(vec![only], dir.path(), "pdf_export").unwrap();
        assert_eq!(out.path(), path);
        assert_eq!(std::fs::read(out.path()).unwrap(), before);
    }

    #[test]
    fn page_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_batch(&mut document_with_pages(&[1]), dir.path(), 1);
        let b = write_batch(&mut document_with_pages(&[2]), dir.path(), 5);
        let err = merge_batches(vec![a, b], dir.path(), "pdf_export").unwrap_err();
        assert!(matches!(
            err,
            ExportError::PageCountMismatch {
                expected: 6,
                actual: 2
            }
        ));
    }

    #[test]
    fn unreadable_batch_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_batch(&mut document_with_pages(&[1]), dir.path(), 1);
        let bad = IntermediateFile::write(b"not a pdf", 1, dir.path(), "pdf_batch_").unwrap();
        let err = merge_batches(vec![good, bad], dir.path(), "pdf_export").unwrap_err();
        assert!(matches!(err, ExportError::Merge(_)));
        // Inputs were dropped with the error; nothing else was created.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
