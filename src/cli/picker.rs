use std::io::Write;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::transport::{DeviceChooser, DiscoveredDevice};
use crate::utils::{format_device_name, format_rssi};

/// Interactive stdin-backed device picker for chooser-gated scans.
///
/// The prompt goes to stderr so piped stdout stays clean. An empty line,
/// EOF or an unparsable answer all count as a dismissal.
pub(crate) struct TerminalChooser;

#[async_trait]
impl DeviceChooser for TerminalChooser {
    async fn choose(&self, candidates: &[DiscoveredDevice]) -> Option<usize> {
        let prompt = render_prompt(candidates);
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            stderr.write_all(prompt.as_bytes()).ok()?;
            stderr.flush().ok()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok()?;
            Some(line)
        })
        .await;

        let line = match answer {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(error) => {
                warn!(?error, "picker input task failed");
                return None;
            }
        };
        parse_choice(&line, candidates.len())
    }
}

fn render_prompt(candidates: &[DiscoveredDevice]) -> String {
    let mut prompt = String::from("Select a device:\n");
    for (index, device) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "  [{index}] {} ({}, rssi {})\n",
            format_device_name(device.display_name()),
            device.id(),
            format_rssi(device.rssi()),
        ));
    }
    prompt.push_str("Choice (empty to cancel): ");
    prompt
}

fn parse_choice(line: &str, candidate_count: usize) -> Option<usize> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        debug!("picker dismissed");
        return None;
    }
    match trimmed.parse::<usize>() {
        Ok(index) if index < candidate_count => Some(index),
        Ok(index) => {
            debug!(index, candidate_count, "picker choice out of range");
            None
        }
        Err(_) => {
            debug!(input = trimmed, "picker choice not a number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("1\n", Some(1))]
    #[case("  0  \n", Some(0))]
    #[case("\n", None)]
    #[case("7\n", None)]
    #[case("first\n", None)]
    fn parses_choices(#[case] line: &str, #[case] expected: Option<usize>) {
        assert_eq!(expected, parse_choice(line, 3));
    }

    #[test]
    fn prompt_lists_every_candidate() {
        let candidates = vec![
            DiscoveredDevice::new("AA:BB".to_string(), Some("HRM".to_string()), Some(-40), None),
            DiscoveredDevice::new("CC:DD".to_string(), None, None, None),
        ];
        let prompt = render_prompt(&candidates);
        assert!(prompt.contains("[0] HRM (AA:BB, rssi -40)"));
        assert!(prompt.contains("[1] Unknown (CC:DD, rssi -)"));
    }
}
