use crate::structs::*;

use crossbeam_channel::Receiver;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Runs the trace export thread.
///
/// Every packet received is written as one JSON object per line, in emission order. Returns
/// once all the senders are dropped, with the number of packets written.
pub fn run_export(rx: Receiver<Packet>, outfile: &Path) -> io::Result<usize> {
    log::trace!("Start trace export thread");
    let file_out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(outfile)?;
    log::trace!("Saving into {}", outfile.display());
    write_trace(rx, BufWriter::new(file_out))
}

/// Writes packets as JSON lines until the channel is closed
pub fn write_trace(rx: Receiver<Packet>, mut out: impl Write) -> io::Result<usize> {
    let mut count = 0;
    for packet in rx.iter() {
        serde_json::to_writer(&mut out, &packet)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;
    log::debug!("{count} packets exported");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn json_lines() {
        let (tx, rx) = unbounded();
        for seq in 0..3 {
            tx.send(Packet {
                seq,
                size: 100,
                timestamp: Duration::from_millis(1500),
                active_bursts: 2,
            })
            .unwrap();
        }
        drop(tx);
        let mut out = vec![];
        assert_eq!(write_trace(rx, &mut out).unwrap(), 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["seq"], 0);
        assert_eq!(first["size"], 100);
        assert_eq!(first["timestamp"], 1.5);
        assert_eq!(first["active_bursts"], 2);
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let (tx, rx) = unbounded::<Packet>();
        drop(tx);
        assert_eq!(run_export(rx, &path).unwrap(), 0);
        assert!(path.exists());
    }
}
