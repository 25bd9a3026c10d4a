//! Memory consumption reports.

use std::fmt;

use alloc_meter::AllocationStats;

/// Width of the right-aligned key column.
const KEY_WIDTH: usize = 19;

/// Outcome of one measurement run.
///
/// # Examples
///
/// ```
/// use alloc_meter::Tracker;
/// use transport_probe::RunReport;
///
/// let tracker = Tracker::new();
/// tracker.record_allocate(1024);
///
/// let report = RunReport::new("1.0.0", "MQTT_PROTOCOL", 1, 0, tracker.snapshot());
/// assert!(report.to_string().contains("Max Memory Used:\t1024"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    sdk_version_label: String,
    os_label: &'static str,
    transport_label: &'static str,
    messages_sent: u64,
    send_failures: u64,
    stats: AllocationStats,
}

impl RunReport {
    /// Creates a report for the operating system the process runs on.
    #[must_use]
    pub fn new(
        sdk_version_label: impl Into<String>,
        transport_label: &'static str,
        messages_sent: u64,
        send_failures: u64,
        stats: AllocationStats,
    ) -> Self {
        Self {
            sdk_version_label: sdk_version_label.into(),
            os_label: os_label(),
            transport_label,
            messages_sent,
            send_failures,
            stats,
        }
    }

    /// Version of the client library that was measured.
    #[must_use]
    pub fn sdk_version_label(&self) -> &str {
        &self.sdk_version_label
    }

    /// Operating system the run happened on.
    #[must_use]
    pub const fn os_label(&self) -> &'static str {
        self.os_label
    }

    /// Protocol label of the transport that was used.
    #[must_use]
    pub const fn transport_label(&self) -> &'static str {
        self.transport_label
    }

    /// Messages the client accepted for transmission.
    #[must_use]
    pub const fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Submissions the client refused.
    #[must_use]
    pub const fn send_failures(&self) -> u64 {
        self.send_failures
    }

    /// Allocation statistics taken after the client was destroyed.
    #[must_use]
    pub const fn stats(&self) -> AllocationStats {
        self.stats
    }

    /// Prints the report to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        print!("{self}");
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        line(f, "Client SDK Version", &self.sdk_version_label)?;
        line(f, "Operating System", self.os_label)?;
        line(f, "Transport in Use", self.transport_label)?;
        line(f, "Messages Sent", self.messages_sent)?;
        line(f, "Max Memory Used", self.stats.peak_bytes())?;
        line(f, "Current Memory Used", self.stats.current_bytes())?;
        line(f, "Num of Allocations", self.stats.allocation_count())
    }
}

fn line(f: &mut fmt::Formatter<'_>, key: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{key:>KEY_WIDTH$}:\t{value}")
}

/// Human-readable name of the operating system the process was built for.
#[must_use]
pub fn os_label() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "linux" => "Linux",
        "macos" => "macOS",
        other => other,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use alloc_meter::Tracker;

    use super::*;

    fn sample_stats() -> AllocationStats {
        let tracker = Tracker::new();
        tracker.record_allocate(4000);
        tracker.record_allocate(1000);
        tracker.record_free(4000);
        tracker.snapshot()
    }

    #[test]
    fn display_has_one_tab_separated_line_per_field() {
        let report = RunReport::new("1.2.3", "AMQP_PROTOCOL", 1, 0, sample_stats());
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 7);
        assert!(lines.iter().all(|line| line.contains(":\t")));
        assert_eq!(lines[0], " Client SDK Version:\t1.2.3");
        assert_eq!(lines[1], format!("   Operating System:\t{}", os_label()));
        assert_eq!(lines[2], "   Transport in Use:\tAMQP_PROTOCOL");
        assert_eq!(lines[3], "      Messages Sent:\t1");
        assert_eq!(lines[4], "    Max Memory Used:\t5000");
        assert_eq!(lines[5], "Current Memory Used:\t1000");
        assert_eq!(lines[6], " Num of Allocations:\t2");
    }

    #[test]
    fn keys_are_right_aligned() {
        let report = RunReport::new("x", "MQTT_PROTOCOL", 0, 0, AllocationStats::default());

        for line in report.to_string().lines() {
            let colon = line.find(":\t").unwrap();
            assert_eq!(colon, KEY_WIDTH);
        }
    }

    #[test]
    fn accessors_return_constructor_values() {
        let stats = sample_stats();
        let report = RunReport::new("9.9", "HTTP_PROTOCOL", 3, 2, stats);

        assert_eq!(report.sdk_version_label(), "9.9");
        assert_eq!(report.transport_label(), "HTTP_PROTOCOL");
        assert_eq!(report.messages_sent(), 3);
        assert_eq!(report.send_failures(), 2);
        assert_eq!(report.stats(), stats);
        assert_eq!(report.os_label(), os_label());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn linux_label() {
        assert_eq!(os_label(), "Linux");
    }

    static_assertions::assert_impl_all!(RunReport: Send, Sync);
}
