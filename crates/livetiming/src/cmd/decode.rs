use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use livetiming::frame::{Cipher, DecodedFrame, FrameError, PacketReader, PayloadState, SessionKey};
use livetiming::session::{Outcome, Reconciler};
use livetiming::transport::http::parse_session_key;
use tracing::{info, warn};

use crate::cmd::{load_catalog, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decode_summary, print_frames, DecodeSummary, OutputFormat};

/// Decode a capture the way the live connection would, without a network.
///
/// Snapshot markers are counted but never fetched. A capture that ends inside
/// a packet is reported through `trailing_bytes`, not as a failure.
pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = Arc::new(load_catalog(args.catalog.as_deref())?);
    let mut cipher = match &args.key {
        Some(hex) => {
            let key = parse_session_key(hex)
                .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --key: {err}")))?;
            Some(Cipher::new(SessionKey::new(key)))
        }
        None => None,
    };

    let file = File::open(&args.capture)
        .map_err(|err| io_error(&format!("capture {}", args.capture.display()), err))?;
    let mut reader = PacketReader::with_catalog(BufReader::new(file), Arc::clone(&catalog));
    let mut reconciler = Reconciler::new();
    let mut frames = Vec::new();
    let mut summary = DecodeSummary {
        catalog_version: catalog.version(),
        ..DecodeSummary::default()
    };

    loop {
        let packet = match reader.read_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(FrameError::Truncated { pending }) => {
                warn!(pending, "capture ends inside a packet");
                summary.trailing_bytes = pending;
                break;
            }
            Err(err) => return Err(frame_error(&format!("capture {}", args.capture.display()), err)),
        };

        let decoded = DecodedFrame::from_packet(packet, cipher.as_mut());
        if decoded.payload_state == PayloadState::Ciphertext {
            summary.ciphertext_frames += 1;
        }
        match reconciler.apply(&decoded.frame) {
            Some(Outcome::SnapshotRequested { snapshot_id }) => {
                info!(snapshot_id, "snapshot marker");
                summary.snapshot_markers += 1;
            }
            Some(Outcome::CommentaryComplete { text, .. }) => {
                info!("commentary: {text}");
                summary.commentary_messages += 1;
            }
            Some(Outcome::EventStarted { event, .. }) => {
                info!(path = %event.channel_path(), "event started");
            }
            None => {}
        }
        frames.push(decoded);
    }

    summary.frames = reader.packets();
    summary.skipped_bytes = reader.skipped_bytes();

    print_frames(&frames, format);
    print_decode_summary(&summary, format);
    Ok(SUCCESS)
}
