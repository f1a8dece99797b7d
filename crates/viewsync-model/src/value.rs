#![deny(unsafe_code)]

use std::fmt;

/// A single typed cell in a cached table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Display string for this cell. `Missing` renders as the empty string;
    /// callers that want a visible placeholder substitute their own.
    pub fn render(&self) -> String {
        match self {
            Self::Text(v) => v.clone(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Missing => String::new(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(CellValue::Text("lab-3".into()).render(), "lab-3");
        assert_eq!(CellValue::Int(42).render(), "42");
        assert_eq!(CellValue::Bool(false).render(), "false");
        assert_eq!(CellValue::Missing.render(), "");
    }

    #[test]
    fn test_serde_round_trip() {
        let value = CellValue::Int(7);
        let json = serde_json::to_string(&value).unwrap();
        let back: CellValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
