//! Kitchen ticket printing
//!
//! Printing is best-effort: callers log failures and carry on.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use crate::config::PrinterConfig;
use crate::ordering::CartLine;
use crate::{Error, Result};

const ESC_INIT: &[u8] = &[0x1b, 0x40];
const ESC_BOLD_ON: &[u8] = &[0x1b, 0x45, 0x01];
const ESC_BOLD_OFF: &[u8] = &[0x1b, 0x45, 0x00];
const GS_CUT: &[u8] = &[0x1d, 0x56, 0x00];

/// Columns reserved right of the item name
const QTY_COLUMNS: usize = 8;

/// Sends kitchen tickets to a physical printer
#[async_trait]
pub trait Printer: Send + Sync {
    /// Print one ticket
    ///
    /// # Errors
    ///
    /// Returns error if the device is absent or the write fails
    async fn print_ticket(&self, lines: &[CartLine], table_number: &str, ticket_no: i64) -> Result<()>;
}

/// A rendered kitchen ticket
#[derive(Debug, Clone)]
pub struct KitchenTicket<'a> {
    pub table_number: &'a str,
    pub ticket_no: i64,
    pub lines: &'a [CartLine],
    pub printed_at: DateTime<Local>,
}

impl KitchenTicket<'_> {
    /// Header block (table, order ref, date)
    fn header(&self, width: usize) -> (String, String) {
        let bold = format!("Table: {}\nOrder: {}\n", self.table_number, self.ticket_no);
        let plain = format!(
            "Date: {}  {}\n{}\n",
            self.printed_at.format("%d-%m-%Y"),
            self.printed_at.format("%I:%M %p"),
            "-".repeat(width)
        );
        (bold, plain)
    }

    /// Item table with separators
    fn body(&self, width: usize) -> String {
        let name_width = width.saturating_sub(QTY_COLUMNS).max(1);
        let separator = "-".repeat(width);

        let mut out = format!("{:<name_width$} {:>4}\n{separator}\n", "Item", "Qty");
        for line in self.lines {
            let name: String = line.name.chars().take(name_width).collect();
            out.push_str(&format!("{name:<name_width$} {:>4}\n", line.quantity));
        }
        out.push_str(&separator);
        out.push_str("\n\n\n");
        out
    }

    /// Plain-text rendering
    #[must_use]
    pub fn render(&self, width: usize) -> String {
        let (bold, plain) = self.header(width);
        format!("{bold}{plain}{}", self.body(width))
    }

    /// ESC/POS byte stream ending in a paper cut
    #[must_use]
    pub fn to_escpos(&self, width: usize) -> Vec<u8> {
        let (bold, plain) = self.header(width);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(ESC_INIT);
        bytes.extend_from_slice(ESC_BOLD_ON);
        bytes.extend_from_slice(bold.as_bytes());
        bytes.extend_from_slice(ESC_BOLD_OFF);
        bytes.extend_from_slice(plain.as_bytes());
        bytes.extend_from_slice(self.body(width).as_bytes());
        bytes.extend_from_slice(GS_CUT);
        bytes
    }
}

/// Writes ESC/POS tickets to a raw device file (e.g. `/dev/usb/lp0`)
///
/// A device that never accepts the write (offline, jammed, a pipe with no
/// reader) fails after `timeout` instead of stalling the caller.
pub struct DevicePrinter {
    device: PathBuf,
    width: usize,
    timeout: Duration,
}

impl DevicePrinter {
    #[must_use]
    pub const fn new(device: PathBuf, width: usize, timeout: Duration) -> Self {
        Self {
            device,
            width,
            timeout,
        }
    }

    async fn write_device(&self, bytes: &[u8]) -> Result<()> {
        let mut device = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.device)
            .await
            .map_err(|e| Error::Printer(format!("{}: {e}", self.device.display())))?;

        device.write_all(bytes).await?;
        device.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Printer for DevicePrinter {
    async fn print_ticket(&self, lines: &[CartLine], table_number: &str, ticket_no: i64) -> Result<()> {
        let ticket = KitchenTicket {
            table_number,
            ticket_no,
            lines,
            printed_at: Local::now(),
        };

        let bytes = ticket.to_escpos(self.width);
        tokio::time::timeout(self.timeout, self.write_device(&bytes))
            .await
            .map_err(|_| {
                Error::Printer(format!(
                    "{}: timed out after {:?}",
                    self.device.display(),
                    self.timeout
                ))
            })??;

        tracing::info!(ticket_no, table = table_number, lines = lines.len(), "kitchen ticket printed");
        Ok(())
    }
}

/// Stand-in used when no printer is configured; every print fails
#[derive(Debug, Default)]
pub struct DisabledPrinter;

#[async_trait]
impl Printer for DisabledPrinter {
    async fn print_ticket(&self, _lines: &[CartLine], _table_number: &str, _ticket_no: i64) -> Result<()> {
        Err(Error::Printer("printer disabled".to_string()))
    }
}

/// Build the printer selected in configuration
#[must_use]
pub fn from_config(config: &PrinterConfig) -> Box<dyn Printer> {
    if config.enabled {
        Box::new(DevicePrinter::new(
            config.device.clone(),
            config.width,
            Duration::from_secs(config.timeout_secs),
        ))
    } else {
        Box::new(DisabledPrinter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<CartLine> {
        vec![
            CartLine {
                dish_id: "d1".to_string(),
                name: "Chettinad Chicken Biryani Special".to_string(),
                unit_price: 180.0,
                quantity: 2,
            },
            CartLine {
                dish_id: "d2".to_string(),
                name: "Filter Coffee".to_string(),
                unit_price: 25.0,
                quantity: 12,
            },
        ]
    }

    #[test]
    fn ticket_truncates_names_and_aligns_quantities() {
        let lines = lines();
        let ticket = KitchenTicket {
            table_number: "7",
            ticket_no: 4242,
            lines: &lines,
            printed_at: Local::now(),
        };
        let text = ticket.render(32);

        assert!(text.starts_with("Table: 7\nOrder: 4242\n"));
        assert!(text.contains(&"-".repeat(32)));
        assert!(text.contains("Chettinad Chicken Biryan    2\n"));
        assert!(text.contains("Filter Coffee              12\n"));
        for row in text.lines() {
            assert!(row.chars().count() <= 32, "row too wide: {row:?}");
        }
    }

    #[test]
    fn escpos_stream_ends_with_cut() {
        let lines = lines();
        let ticket = KitchenTicket {
            table_number: "1",
            ticket_no: 1,
            lines: &lines,
            printed_at: Local::now(),
        };
        let bytes = ticket.to_escpos(32);
        assert!(bytes.starts_with(ESC_INIT));
        assert!(bytes.ends_with(GS_CUT));
    }

    #[tokio::test]
    async fn device_printer_writes_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let printer = DevicePrinter::new(file.path().to_path_buf(), 32, Duration::from_secs(1));

        printer.print_ticket(&lines(), "3", 99).await.unwrap();

        let written = std::fs::read(file.path()).unwrap();
        assert!(written.ends_with(GS_CUT));
        assert!(String::from_utf8_lossy(&written).contains("Table: 3"));
    }

    #[tokio::test]
    async fn missing_device_is_an_error() {
        let printer = DevicePrinter::new(PathBuf::from("/nonexistent/lp0"), 32, Duration::from_secs(1));
        assert!(printer.print_ticket(&lines(), "1", 1).await.is_err());
        assert!(DisabledPrinter.print_ticket(&lines(), "1", 1).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blocked_device_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("lp0");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(status.success());

        // No reader on the pipe, so opening it for writing never completes
        let printer = DevicePrinter::new(fifo.clone(), 32, Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = printer.print_ticket(&lines(), "1", 1).await.unwrap_err();

        assert!(matches!(err, Error::Printer(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(3));

        // Release the open still parked on the blocking pool
        drop(std::fs::File::open(&fifo).unwrap());
    }
}
