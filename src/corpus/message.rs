//! Splitting a raw RFC 822-style message into header fields and body.

use crate::model::types::IngestRecord;

#[derive(Clone, Copy)]
enum Header {
    Subject,
    From,
    To,
    Date,
}

fn classify(line: &str) -> Option<(Header, &str)> {
    [
        ("Subject:", Header::Subject),
        ("From:", Header::From),
        ("To:", Header::To),
        ("Date:", Header::Date),
    ]
    .into_iter()
    .find_map(|(prefix, header)| line.strip_prefix(prefix).map(|rest| (header, rest.trim())))
}

fn field<'r>(record: &'r mut IngestRecord, header: Header) -> &'r mut String {
    match header {
        Header::Subject => &mut record.subject,
        Header::From => &mut record.sender,
        Header::To => &mut record.recipients,
        Header::Date => &mut record.date_sent,
    }
}

/// Parse `raw` into a record stored under `source_path`.
///
/// Headers run until the first blank line; body lines are joined with single
/// spaces. Folded header lines (leading whitespace) extend the header above
/// them. Text with no blank separator line at all cannot be split, so the
/// whole of it becomes the body and the header fields stay empty.
pub fn parse_message(source_path: &str, raw: &str) -> IngestRecord {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut record = IngestRecord {
        source_path: source_path.to_string(),
        ..Default::default()
    };

    let Some(separator) = lines.iter().position(|line| line.trim().is_empty()) else {
        record.body = lines.join(" ").trim().to_string();
        return record;
    };

    let mut current: Option<Header> = None;
    for line in &lines[..separator] {
        if line.starts_with([' ', '\t']) {
            if let Some(header) = current {
                let value = field(&mut record, header);
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
            }
            continue;
        }
        current = classify(line).map(|(header, value)| {
            *field(&mut record, header) = value.to_string();
            header
        });
    }

    record.body = lines[separator + 1..].join(" ").trim().to_string();
    record
}
