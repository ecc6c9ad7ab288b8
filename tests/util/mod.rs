use mailsearch::error::Result;
use mailsearch::model::types::IngestRecord;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Appended to fixture bodies so they clear the 50-character floor.
#[allow(dead_code)]
pub const PADDING: &str = "with enough trailing filler words to clear the minimum body length";

/// Run `f` with a subscriber that records `warn` and above, returning the
/// captured log text alongside `f`'s result.
#[allow(dead_code)]
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || LogSink(sink.clone()))
        .finish();

    let value = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.lock().unwrap()).into_owned();
    (value, logs)
}

struct LogSink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Builds small email corpora as records, CSV exports, or maildir-style trees.
#[allow(dead_code)]
#[derive(Default)]
pub struct CorpusBuilder {
    messages: Vec<IngestRecord>,
}

#[allow(dead_code)]
impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message with headers. `body` is used as given.
    pub fn message(mut self, path: &str, sender: &str, subject: &str, body: &str) -> Self {
        self.messages.push(IngestRecord {
            source_path: path.to_string(),
            subject: subject.to_string(),
            sender: sender.to_string(),
            recipients: "team@enron.com".to_string(),
            date_sent: "Mon, 14 May 2001 16:39:00 -0700".to_string(),
            body: body.to_string(),
        });
        self
    }

    /// Add a header-less message whose body is `text` followed by [`PADDING`].
    pub fn padded(self, path: &str, text: &str) -> Self {
        self.message(path, "", "", &format!("{text} {PADDING}"))
    }

    pub fn records(&self) -> Vec<IngestRecord> {
        self.messages.clone()
    }

    /// Records wrapped for `IndexBuilder::ingest`.
    pub fn stream(&self) -> Vec<Result<IngestRecord>> {
        self.messages.iter().cloned().map(Ok).collect()
    }

    /// Raw RFC-822-ish text for one record, as found in the corpus exports.
    pub fn raw_message(record: &IngestRecord) -> String {
        let mut raw = String::from("Message-ID: <fixture@thyme>\n");
        if !record.date_sent.is_empty() {
            raw.push_str(&format!("Date: {}\n", record.date_sent));
        }
        if !record.sender.is_empty() {
            raw.push_str(&format!("From: {}\n", record.sender));
        }
        if !record.recipients.is_empty() {
            raw.push_str(&format!("To: {}\n", record.recipients));
        }
        raw.push_str(&format!("Subject: {}\n", record.subject));
        raw.push('\n');
        raw.push_str(&record.body);
        raw.push('\n');
        raw
    }

    /// Write a `file,message` CSV export under `dir`.
    pub fn write_csv(&self, dir: &Path) -> PathBuf {
        let path = dir.join("emails.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        writer.write_record(["file", "message"]).unwrap();
        for record in &self.messages {
            writer
                .write_record([record.source_path.as_str(), &Self::raw_message(record)])
                .unwrap();
        }
        writer.flush().unwrap();
        path
    }

    /// Write one file per message under `dir/maildir`, keyed by source path.
    pub fn write_tree(&self, dir: &Path) -> PathBuf {
        let root = dir.join("maildir");
        for record in &self.messages {
            let path = root.join(&record.source_path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, Self::raw_message(record)).unwrap();
        }
        root
    }
}
