//! Localized labels, messages and date formats.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported export languages. Unknown language codes fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    De,
}

/// Keys of the strings the exporter prints or reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    WorkPackagePlural,
    Description,
    Attachments,
    ErrorTooManyColumns,
    ErrorFailedToExport,
}

impl Locale {
    /// Parse a language code such as `de`, `de-DE` or `en_US`.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "de" => Locale::De,
            _ => Locale::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::De => "de",
        }
    }

    /// Translate a label.
    pub fn t(&self, label: Label) -> &'static str {
        match (self, label) {
            (Locale::En, Label::WorkPackagePlural) => "Work packages",
            (Locale::De, Label::WorkPackagePlural) => "Arbeitspakete",
            (Locale::En, Label::Description) => "Description",
            (Locale::De, Label::Description) => "Beschreibung",
            (Locale::En, Label::Attachments) => "Attachments",
            (Locale::De, Label::Attachments) => "Anhänge",
            (Locale::En, Label::ErrorTooManyColumns) => {
                "Too many columns selected for the PDF export. Please reduce the number of columns."
            }
            (Locale::De, Label::ErrorTooManyColumns) => {
                "Zu viele Spalten für den PDF-Export ausgewählt. \
                 Bitte reduzieren Sie die Anzahl der Spalten."
            }
            (Locale::En, Label::ErrorFailedToExport) => "The PDF export could not be created.",
            (Locale::De, Label::ErrorFailedToExport) => {
                "Der PDF-Export konnte nicht erstellt werden."
            }
        }
    }

    /// Format a date the way it is printed in page footers.
    pub fn format_date(&self, date: NaiveDate) -> String {
        match self {
            Locale::En => date.format("%m/%d/%Y").to_string(),
            Locale::De => date.format("%d.%m.%Y").to_string(),
        }
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Locale::from_code(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_suffixes_are_ignored() {
        assert_eq!(Locale::from_code("de-DE"), Locale::De);
        assert_eq!(Locale::from_code("DE_at"), Locale::De);
        assert_eq!(Locale::from_code("en_US"), Locale::En);
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(Locale::from_code("tlh"), Locale::En);
        assert_eq!(Locale::from_code(""), Locale::En);
    }

    #[test]
    fn dates_follow_locale() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Locale::En.format_date(date), "03/09/2024");
        assert_eq!(Locale::De.format_date(date), "09.03.2024");
    }

    #[test]
    fn locale_deserializes_from_code() {
        let locale: Locale = serde_json::from_str("\"de-CH\"").unwrap();
        assert_eq!(locale, Locale::De);
        assert_eq!(serde_json::to_string(&Locale::De).unwrap(), "\"de\"");
    }
}
