use chrono::{DateTime, Local, NaiveDateTime, Utc};

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Fixed-width UTC timestamp written by the file encoder.
pub fn format_utc_millis(time: DateTime<Utc>) -> String {
    time.format(FILE_TIMESTAMP_FORMAT).to_string()
}

pub fn format_local(time: DateTime<Utc>, format: &str) -> String {
    time.with_timezone(&Local).format(format).to_string()
}

/// Timestamp embedded in rotated backup file names. Contains no `:` so it is
/// a valid path component everywhere.
pub fn format_backup_timestamp(time: DateTime<Utc>) -> String {
    time.format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_backup_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Canonical hex dump: offset, 16 bytes split in two groups of 8, and an
/// ASCII gutter. Rows are separated by newlines with no trailing newline.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut rows = Vec::with_capacity(bytes.len() / 16 + 1);

    for (row, chunk) in bytes.chunks(16).enumerate() {
        let mut hex_part = String::with_capacity(49);
        for (i, byte) in chunk.iter().enumerate() {
            if i == 8 {
                hex_part.push(' ');
            }
            hex_part.push_str(&hex::encode([*byte]));
            hex_part.push(' ');
        }

        let ascii: String = chunk
            .iter()
            .map(|b| {
                if b.is_ascii_graphic() || *b == b' ' {
                    *b as char
                } else {
                    '.'
                }
            })
            .collect();

        rows.push(format!("{:08x}  {:<49} |{}|", row * 16, hex_part, ascii));
    }

    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn utc_timestamp_has_millis_and_zulu_suffix() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_utc_millis(time), "2024-03-09T07:05:01.000Z");
    }

    #[test]
    fn backup_timestamp_parses_back() {
        let time = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();
        let text = format_backup_timestamp(time);
        assert_eq!(text, "2023-12-31T23-59-58.000");
        assert_eq!(parse_backup_timestamp(&text), Some(time));
        assert_eq!(parse_backup_timestamp("not-a-time"), None);
    }

    #[test]
    fn hex_dump_formats_rows() {
        let dump = hex_dump(b"hello");
        assert!(dump.starts_with("00000000  68 65 6c 6c 6f "));
        assert!(dump.ends_with("|hello|"));
        assert!(!dump.contains('\n'));

        let two_rows = hex_dump(&[0u8; 17]);
        let lines: Vec<_> = two_rows.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000010  00 "));
        assert!(lines[0].ends_with("|................|"));
    }

    #[test]
    fn hex_dump_of_empty_input_is_empty() {
        assert_eq!(hex_dump(&[]), "");
    }
}
