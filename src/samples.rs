//! Sample queries for testing and demonstration.
//!
//! Each sample exercises different parts of the export: the overview table,
//! long descriptions, and image attachments.

use std::collections::BTreeMap;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{ExportError, Result};
use crate::model::{Attachment, Column, QuerySnapshot, WorkPackage};

const TYPES: [&str; 4] = ["Task", "Bug", "Feature", "Milestone"];
const STATUSES: [&str; 4] = ["New", "In progress", "On hold", "Closed"];
const ASSIGNEES: [&str; 3] = ["Ada Lovelace", "Grace Hopper", "Alan Turing"];
const PRIORITIES: [&str; 3] = ["Low", "Normal", "High"];

/// Columns of a typical work package table.
pub fn sample_columns() -> Vec<Column> {
    vec![
        Column::new("id", "ID"),
        Column::new("type", "Type"),
        Column::new("subject", "Subject"),
        Column::new("status", "Status"),
        Column::new("assigned_to", "Assignee"),
        Column::new("priority", "Priority"),
    ]
}

/// `n` work packages with attribute values and descriptions.
pub fn sample_work_packages(n: usize) -> Vec<WorkPackage> {
    (0..n)
        .map(|i| {
            let mut attributes = BTreeMap::new();
            attributes.insert("status".to_string(), STATUSES[i % STATUSES.len()].to_string());
            attributes.insert(
                "assigned_to".to_string(),
                ASSIGNEES[i % ASSIGNEES.len()].to_string(),
            );
            attributes.insert(
                "priority".to_string(),
                PRIORITIES[i % PRIORITIES.len()].to_string(),
            );
            WorkPackage {
                id: 1000 + i as u64,
                subject: format!("Work package number {}", i + 1),
                type_name: TYPES[i % TYPES.len()].to_string(),
                attributes,
                description: Some(format!(
                    "Acceptance criteria for item {}.\n\
                     The change is reviewed, tested and documented.",
                    i + 1
                )),
                attachments: Vec::new(),
            }
        })
        .collect()
}

/// A saved query named "Sample" in project "Demo project".
pub fn sample_query(n: usize) -> QuerySnapshot {
    QuerySnapshot {
        name: Some("Sample".to_string()),
        project: Some("Demo project".to_string()),
        columns: sample_columns(),
        work_packages: sample_work_packages(n),
    }
}

/// Attach the same image (by source) to every work package.
pub fn with_image_attachment(
    mut work_packages: Vec<WorkPackage>,
    source: &str,
) -> Vec<WorkPackage> {
    for wp in &mut work_packages {
        wp.attachments.push(Attachment {
            filename: format!("screenshot-{}.png", wp.id),
            content_type: "image/png".to_string(),
            source: source.to_string(),
        });
    }
    work_packages
}

/// A single-colour PNG of the given size as a base64 data URI.
pub fn solid_png_data_uri(width: u32, height: u32, rgb: [u8; 3]) -> Result<String> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| ExportError::Image(e.to_string()))?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STD.encode(bytes.into_inner())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_values_cover_every_column() {
        let wps = sample_work_packages(4);
        for column in sample_columns() {
            assert!(
                wps.iter().all(|wp| !wp.value(&column.key).is_empty()),
                "empty value for {}",
                column.key
            );
        }
    }

    #[test]
    fn ids_are_unique() {
        let wps = sample_work_packages(50);
        let mut ids: Vec<u64> = wps.iter().map(|wp| wp.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn attachment_is_added_to_every_work_package() {
        let wps = with_image_attachment(sample_work_packages(3), "/tmp/x.png");
        assert!(wps.iter().all(|wp| wp.attachments.len() == 1 && wp.attachments[0].is_image()));
    }
}
