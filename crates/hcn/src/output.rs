use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Ordered field/value pairs describing one result.
#[derive(Debug, Default)]
pub struct Report {
    rows: Vec<(&'static str, Value)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.rows.push((name, value.into()));
        self
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .rows
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }
}

pub fn print_report(report: &Report, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&report.to_json()).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in &report.rows {
                table.add_row(vec![name.to_string(), display_value(value)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = report
                .rows
                .iter()
                .map(|(name, value)| format!("{name}={}", display_value(value)))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

/// Units as the hex strings the `decode` command accepts.
pub fn hex_units(units: &[u16]) -> Vec<String> {
    units.iter().map(|unit| format!("{unit:04X}")).collect()
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_keeps_values() {
        let report = Report::new()
            .field("type", "keyvalue")
            .field("units", hex_units(&[0x1F20, 0]));
        let json = report.to_json();
        assert_eq!(json["type"], "keyvalue");
        assert_eq!(json["units"][0], "1F20");
    }

    #[test]
    fn display_flattens_arrays() {
        let value = Value::from(hex_units(&[0x1F20, 0xFFFF, 0]));
        assert_eq!(display_value(&value), "1F20 FFFF 0000");
        assert_eq!(display_value(&Value::Null), "-");
        assert_eq!(display_value(&Value::from(3)), "3");
    }
}
