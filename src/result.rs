//! Terminal result handlers (§6, §11.5).

use std::io::Write;

use crate::error::Result;
use crate::value::Record;

/// Consumes the pipeline's final records. `success` is checked once, after the last record (or
/// immediately, if the stage produced none), to decide whether the overall pipeline succeeded.
pub trait ResultHandler {
    fn emit(&mut self, record: &Record) -> Result<()>;
    fn success(&self) -> bool;
}

/// Serializes each record as a text line to stdout. The default handler (§6).
#[derive(Default)]
pub struct StdoutHandler {
    count: usize,
}

impl ResultHandler for StdoutHandler {
    fn emit(&mut self, record: &Record) -> Result<()> {
        println!("{}", crate::value::Value::Object(record.clone()));
        self.count += 1;
        Ok(())
    }

    fn success(&self) -> bool {
        true
    }
}

/// Buffers every emitted record. Used by tests and the in-process demo harness.
#[derive(Default)]
pub struct CollectHandler {
    pub records: Vec<Record>,
}

impl ResultHandler for CollectHandler {
    fn emit(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn success(&self) -> bool {
        true
    }
}

/// Writes one JSON object per line to an arbitrary `Write` sink (`-o <file>`).
pub struct JsonLinesHandler<W: Write> {
    sink: W,
    failed: bool,
}

impl<W: Write> JsonLinesHandler<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            failed: false,
        }
    }
}

impl<W: Write> ResultHandler for JsonLinesHandler<W> {
    fn emit(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_string(record)?;
        if writeln!(self.sink, "{line}").is_err() {
            self.failed = true;
        }
        Ok(())
    }

    fn success(&self) -> bool {
        !self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn collect_handler_keeps_emitted_records_in_order() {
        let mut handler = CollectHandler::default();
        let mut r1 = Record::new();
        r1.insert("id".to_string(), Value::Int(1));
        let mut r2 = Record::new();
        r2.insert("id".to_string(), Value::Int(2));

        handler.emit(&r1).unwrap();
        handler.emit(&r2).unwrap();

        assert_eq!(handler.records.len(), 2);
        assert_eq!(handler.records[0].get("id"), Some(&Value::Int(1)));
        assert!(handler.success());
    }

    #[test]
    fn json_lines_handler_writes_one_object_per_line() {
        let mut buf = Vec::new();
        let mut handler = JsonLinesHandler::new(&mut buf);
        let mut record = Record::new();
        record.insert("id".to_string(), Value::Int(1));
        handler.emit(&record).unwrap();
        drop(handler);

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), r#"{"id":1}"#);
    }
}
