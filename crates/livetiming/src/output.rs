use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use livetiming::frame::{Catalog, CatalogEntry, DecodedFrame, LengthRule, PacketClass};
use livetiming::session::{ConnectionStats, FrameDetail, FrameRecord, FrameSource};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

/// Totals printed after an offline decode.
#[derive(Debug, Default, Serialize)]
pub struct DecodeSummary {
    pub catalog_version: u32,
    pub frames: usize,
    pub skipped_bytes: usize,
    pub trailing_bytes: usize,
    pub ciphertext_frames: usize,
    pub snapshot_markers: usize,
    pub commentary_messages: usize,
}

pub fn print_frames(frames: &[DecodedFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for decoded in frames {
                let record = FrameRecord::new(decoded, FrameSource::Live);
                println!("{}", to_json(&record));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CAR", "KIND", "LEN", "STATE", "FRAME", "DETAIL"]);
            for decoded in frames {
                table.add_row(vec![
                    decoded.header.car.to_string(),
                    decoded.header.kind.to_string(),
                    decoded.wire_len.to_string(),
                    format!("{:?}", decoded.payload_state).to_lowercase(),
                    decoded.frame.tag().to_string(),
                    detail(decoded),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for decoded in frames {
                println!(
                    "car={} kind={} len={} {} {}",
                    decoded.header.car,
                    decoded.header.kind,
                    decoded.wire_len,
                    decoded.frame.tag(),
                    detail(decoded)
                );
            }
        }
        OutputFormat::Raw => {
            for decoded in frames {
                print_raw(&decoded.payload);
            }
        }
    }
}

pub fn print_decode_summary(summary: &DecodeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(summary)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["catalog_version".to_string(), summary.catalog_version.to_string()])
                .add_row(vec!["frames".to_string(), summary.frames.to_string()])
                .add_row(vec!["skipped_bytes".to_string(), summary.skipped_bytes.to_string()])
                .add_row(vec!["trailing_bytes".to_string(), summary.trailing_bytes.to_string()])
                .add_row(vec!["ciphertext_frames".to_string(), summary.ciphertext_frames.to_string()])
                .add_row(vec!["snapshot_markers".to_string(), summary.snapshot_markers.to_string()])
                .add_row(vec![
                    "commentary_messages".to_string(),
                    summary.commentary_messages.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} skipped_bytes={} trailing_bytes={} ciphertext_frames={} snapshot_markers={} commentary_messages={} catalog=v{}",
                summary.frames,
                summary.skipped_bytes,
                summary.trailing_bytes,
                summary.ciphertext_frames,
                summary.snapshot_markers,
                summary.commentary_messages,
                summary.catalog_version
            );
        }
        // Raw output carries payload bytes only.
        OutputFormat::Raw => {}
    }
}

pub fn print_catalog(catalog: &Catalog, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => match catalog.to_json_pretty() {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: failed to render catalog: {err}"),
        },
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CLASS", "KIND", "NAME", "LENGTH", "CIPHERED", "ROLE"]);
            for entry in catalog.entries() {
                table.add_row(vec![
                    class_name(entry.class).to_string(),
                    entry.kind.to_string(),
                    entry.name.clone(),
                    length_rule(entry.length),
                    entry.ciphered.to_string(),
                    format!("{:?}", entry.role),
                ]);
            }
            println!("catalog v{}", catalog.version());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("catalog v{}", catalog.version());
            for entry in catalog.entries() {
                println!("{}", entry_line(entry));
            }
        }
    }
}

pub fn print_stats(stats: &ConnectionStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(stats)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["BYTES", "FRAMES", "SKIPPED", "PROBES", "SNAPSHOTS", "PUBLISHED", "DROPPED"])
                .add_row(vec![
                    stats.bytes_read.to_string(),
                    stats.frames.to_string(),
                    stats.skipped_bytes.to_string(),
                    stats.probes.to_string(),
                    stats.snapshots.to_string(),
                    stats.commentary_published.to_string(),
                    stats.commentary_dropped.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "bytes={} frames={} skipped={} probes={} snapshots={}/{} published={} dropped={}",
                stats.bytes_read,
                stats.frames,
                stats.skipped_bytes,
                stats.probes,
                stats.snapshots,
                stats.snapshot_fetches,
                stats.commentary_published,
                stats.commentary_dropped
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn detail(decoded: &DecodedFrame) -> String {
    match FrameDetail::from(&decoded.frame) {
        FrameDetail::SnapshotMarker { snapshot_id } => format!("snapshot {snapshot_id:05}"),
        FrameDetail::CommentaryFragment { text, is_last } => {
            if is_last {
                format!("{text:?} (last)")
            } else {
                format!("{text:?}")
            }
        }
        FrameDetail::DomainEvent {
            event_code,
            event_number,
        } => format!("event code={event_code} number={event_number}"),
        FrameDetail::Opaque => format!("<{} bytes>", decoded.payload.len()),
    }
}

fn class_name(class: PacketClass) -> &'static str {
    match class {
        PacketClass::System => "system",
        PacketClass::Car => "car",
    }
}

fn length_rule(rule: LengthRule) -> String {
    match rule {
        LengthRule::Empty => "empty".to_string(),
        LengthRule::Fixed(len) => format!("fixed({len})"),
        LengthRule::Data => "data".to_string(),
        LengthRule::Packed => "packed".to_string(),
    }
}

fn entry_line(entry: &CatalogEntry) -> String {
    format!(
        "{} {:>2} {:<16} {:<9} ciphered={} role={:?}",
        class_name(entry.class),
        entry.kind,
        entry.name,
        length_rule(entry.length),
        entry.ciphered,
        entry.role
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_rules_render_compactly() {
        assert_eq!(length_rule(LengthRule::Fixed(2)), "fixed(2)");
        assert_eq!(length_rule(LengthRule::Packed), "packed");
    }

    #[test]
    fn catalog_lines_name_every_entry() {
        let catalog = Catalog::v1();
        let line = entry_line(&catalog.entries()[1]);
        assert!(line.starts_with("system  2 key_frame"));
        assert!(line.contains("ciphered=false"));
    }
}
