//! Simulation console: drive mock sensors from stdin.
//!
//! Each line is one command:
//!
//! ```text
//! bike BIKE123     a bike tag is read
//! card 42          a card is swiped
//! ```

use anyhow::Result;
use bikedock_hardware::mock::{MockBikeSensorHandle, MockCardReaderHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Bike(String),
    Card(Vec<u8>),
}

/// Parse a console line; `None` for blank or unknown lines.
pub fn parse_line(line: &str) -> Option<ConsoleCommand> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let argument = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    match command {
        "bike" => Some(ConsoleCommand::Bike(argument.to_string())),
        "card" => argument
            .chars()
            .map(|c| c.to_digit(10).and_then(|d| u8::try_from(d).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(ConsoleCommand::Card),
        _ => None,
    }
}

/// Feed stdin commands into the mock sensors until EOF or cancellation.
pub async fn run(
    card_reader: MockCardReaderHandle,
    bike_sensor: MockBikeSensorHandle,
    cancel: CancellationToken,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Simulation console ready: 'bike <tag>' or 'card <digits>'");

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(());
        };

        match parse_line(&line) {
            Some(ConsoleCommand::Bike(tag)) => bike_sensor.dock_bike(&tag).await?,
            Some(ConsoleCommand::Card(digits)) => card_reader.send_card(&digits).await?,
            None if line.trim().is_empty() => {}
            None => warn!(line = %line, "Unknown console command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("bike BIKE123"),
            Some(ConsoleCommand::Bike("BIKE123".to_string()))
        );
        assert_eq!(parse_line("  card 42 "), Some(ConsoleCommand::Card(vec![4, 2])));
        assert_eq!(parse_line("card 4x"), None);
        assert_eq!(parse_line("card"), None);
        assert_eq!(parse_line("bike A B"), None);
        assert_eq!(parse_line("open sesame"), None);
        assert_eq!(parse_line(""), None);
    }
}
