use crate::cli::OutputFormat;
use crate::metrics::{self, LatencySummary};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Finalized statistics for one client's run
///
/// Serialized field names match the report format of earlier releases so
/// existing tooling keeps parsing the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: usize,
    pub successes: u64,
    pub failures: u64,
    /// Seconds
    pub run_time: f64,
    #[serde(rename = "msg_time_min")]
    pub latency_min: f64,
    #[serde(rename = "msg_time_max")]
    pub latency_max: f64,
    #[serde(rename = "msg_time_mean")]
    pub latency_mean: f64,
    #[serde(rename = "msg_time_ps25")]
    pub latency_p25: f64,
    #[serde(rename = "msg_time_ps50")]
    pub latency_p50: f64,
    #[serde(rename = "msg_time_ps95")]
    pub latency_p95: f64,
    #[serde(rename = "msg_time_std")]
    pub latency_std_dev: f64,
    #[serde(rename = "msgs_per_sec")]
    pub messages_per_second: f64,
}

impl RunResult {
    /// Build a result from the successful round-trip times (ms) of a run
    pub fn from_samples(
        id: usize,
        successes: u64,
        failures: u64,
        run_time: Duration,
        latencies_ms: &[f64],
    ) -> Self {
        let latency = LatencySummary::from_samples(latencies_ms);
        let run_time_secs = run_time.as_secs_f64();
        let messages_per_second = if run_time_secs > 0.0 {
            successes as f64 / run_time_secs
        } else {
            0.0
        };

        Self {
            id,
            successes,
            failures,
            run_time: run_time_secs,
            latency_min: latency.min,
            latency_max: latency.max,
            latency_mean: latency.mean,
            latency_p25: latency.p25,
            latency_p50: latency.p50,
            latency_p95: latency.p95,
            latency_std_dev: latency.std_dev,
            messages_per_second,
        }
    }

    pub fn total_messages(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn ratio(&self) -> f64 {
        success_ratio(self.successes, self.failures)
    }
}

/// Benchmark-wide statistics built from all client results
///
/// Latency figures other than min/max are statistics over the per-client
/// mean latencies, not over the pooled raw samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalResult {
    pub ratio: f64,
    pub successes: u64,
    pub failures: u64,
    /// Wall-clock span of the whole benchmark in seconds
    pub total_run_time: f64,
    pub avg_run_time: f64,
    #[serde(rename = "msg_time_min")]
    pub latency_min: f64,
    #[serde(rename = "msg_time_max")]
    pub latency_max: f64,
    #[serde(rename = "msg_time_mean_avg")]
    pub latency_mean_avg: f64,
    #[serde(rename = "msg_time_mean_std")]
    pub latency_mean_std_dev: f64,
    #[serde(rename = "msg_time_mean_ps25")]
    pub latency_mean_p25: f64,
    #[serde(rename = "msg_time_mean_ps50")]
    pub latency_mean_p50: f64,
    #[serde(rename = "msg_time_mean_ps95")]
    pub latency_mean_p95: f64,
    /// Sum of the per-client rates
    #[serde(rename = "total_msgs_per_sec")]
    pub total_messages_per_second: f64,
    #[serde(rename = "avg_msgs_per_sec")]
    pub avg_messages_per_second: f64,
    #[serde(rename = "ps25_msgs_per_sec")]
    pub p25_messages_per_second: f64,
    #[serde(rename = "ps50_msgs_per_sec")]
    pub p50_messages_per_second: f64,
    #[serde(rename = "ps95_msgs_per_sec")]
    pub p95_messages_per_second: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot aggregate an empty set of run results")]
    NoResults,
}

fn success_ratio(successes: u64, failures: u64) -> f64 {
    let total = successes + failures;
    if total == 0 {
        return 1.0;
    }
    successes as f64 / total as f64
}

/// Merge per-client results into a single benchmark summary
pub fn aggregate(
    results: &[RunResult],
    total_wall_time: Duration,
) -> Result<TotalResult, AggregateError> {
    if results.is_empty() {
        return Err(AggregateError::NoResults);
    }

    let successes: u64 = results.iter().map(|r| r.successes).sum();
    let failures: u64 = results.iter().map(|r| r.failures).sum();

    let means: Vec<f64> = results.iter().map(|r| r.latency_mean).collect();
    let rates: Vec<f64> = results.iter().map(|r| r.messages_per_second).collect();
    let run_times: Vec<f64> = results.iter().map(|r| r.run_time).collect();

    let latency_min = results
        .iter()
        .map(|r| r.latency_min)
        .fold(f64::INFINITY, f64::min);
    let latency_max = results.iter().map(|r| r.latency_max).fold(0.0, f64::max);

    Ok(TotalResult {
        ratio: success_ratio(successes, failures),
        successes,
        failures,
        total_run_time: total_wall_time.as_secs_f64(),
        avg_run_time: metrics::mean(&run_times),
        latency_min,
        latency_max,
        latency_mean_avg: metrics::mean(&means),
        latency_mean_std_dev: metrics::sample_std_dev(&means),
        latency_mean_p25: metrics::percentile(&means, 25.0),
        latency_mean_p50: metrics::percentile(&means, 50.0),
        latency_mean_p95: metrics::percentile(&means, 95.0),
        total_messages_per_second: rates.iter().sum(),
        avg_messages_per_second: metrics::mean(&rates),
        p25_messages_per_second: metrics::percentile(&rates, 25.0),
        p50_messages_per_second: metrics::percentile(&rates, 50.0),
        p95_messages_per_second: metrics::percentile(&rates, 95.0),
    })
}

/// Structured report document
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub runs: Vec<RunResult>,
    pub totals: TotalResult,
}

/// Render the report as tab-indented JSON
pub fn render_json(runs: &[RunResult], totals: &TotalResult) -> Result<String> {
    let report = JsonReport {
        runs: runs.to_vec(),
        totals: totals.clone(),
    };

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    report.serialize(&mut serializer)?;
    Ok(String::from_utf8(out)?)
}

/// Render the human-readable report
pub fn render_text(runs: &[RunResult], totals: &TotalResult) -> String {
    let mut out = String::new();

    // Writing to a String never fails.
    for res in runs {
        let _ = writeln!(out, "======= CLIENT {} =======", res.id);
        let _ = writeln!(
            out,
            "Ratio:                 {:.3} ({}/{})",
            res.ratio(),
            res.successes,
            res.total_messages()
        );
        let _ = writeln!(out, "Runtime (s):           {:.3}", res.run_time);
        let _ = writeln!(out, "Msg time min (ms):     {:.3}", res.latency_min);
        let _ = writeln!(out, "Msg time max (ms):     {:.3}", res.latency_max);
        let _ = writeln!(out, "Msg time mean (ms):    {:.3}", res.latency_mean);
        let _ = writeln!(out, "Msg time std (ms):     {:.3}", res.latency_std_dev);
        let _ = writeln!(out, "Msg time ps 25p (ms):  {:.3}", res.latency_p25);
        let _ = writeln!(out, "Msg time ps 50p (ms):  {:.3}", res.latency_p50);
        let _ = writeln!(out, "Msg time ps 95p (ms):  {:.3}", res.latency_p95);
        let _ = writeln!(out, "Bandwidth (msg/sec):   {:.3}\n", res.messages_per_second);
    }

    let _ = writeln!(out, "========= TOTAL ({}) =========", runs.len());
    let _ = writeln!(
        out,
        "Total Ratio:                 {:.3} ({}/{})",
        totals.ratio,
        totals.successes,
        totals.successes + totals.failures
    );
    let _ = writeln!(out, "Total Runtime (sec):         {:.3}", totals.total_run_time);
    let _ = writeln!(out, "Average Runtime (sec):       {:.3}", totals.avg_run_time);
    let _ = writeln!(out, "Msg time min (ms):           {:.3}", totals.latency_min);
    let _ = writeln!(out, "Msg time max (ms):           {:.3}", totals.latency_max);
    let _ = writeln!(out, "Msg time mean mean (ms):     {:.3}", totals.latency_mean_avg);
    let _ = writeln!(out, "Msg time mean std (ms):      {:.3}", totals.latency_mean_std_dev);
    let _ = writeln!(out, "Msg time mean ps 25p (ms):   {:.3}", totals.latency_mean_p25);
    let _ = writeln!(out, "Msg time mean ps 50p (ms):   {:.3}", totals.latency_mean_p50);
    let _ = writeln!(out, "Msg time mean ps 95p (ms):   {:.3}", totals.latency_mean_p95);
    let _ = writeln!(out, "Average Bandwidth (msg/sec): {:.3}", totals.avg_messages_per_second);
    let _ = writeln!(out, "Total Bandwidth (msg/sec):   {:.3}", totals.total_messages_per_second);

    out
}

/// Results manager for report output and per-client streaming
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    streaming_file: Option<PathBuf>,
    format: OutputFormat,
    streamed: usize,
}

impl ResultsManager {
    /// Create a manager writing to `output_file`, or stdout when `None`
    pub fn new(output_file: Option<&Path>, format: OutputFormat) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            streaming_file: None,
            format,
            streamed: 0,
        }
    }

    /// Stream each client result to `streaming_file` as it arrives
    ///
    /// The file holds a JSON array that is closed by `finalize`.
    pub fn enable_streaming<P: AsRef<Path>>(&mut self, streaming_file: P) -> Result<()> {
        let path = streaming_file.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to create streaming file {:?}", path))?;
        writeln!(file, "[")?;

        debug!("Enabled streaming to: {:?}", path);
        self.streaming_file = Some(path);
        Ok(())
    }

    /// Record a client result as soon as it is collected
    pub fn stream_result(&mut self, result: &RunResult) -> Result<()> {
        let Some(ref streaming_file) = self.streaming_file else {
            return Ok(());
        };

        let mut file = OpenOptions::new().append(true).open(streaming_file)?;
        if self.streamed > 0 {
            writeln!(file, ",")?;
        }
        write!(file, "{}", serde_json::to_string_pretty(result)?)?;
        file.flush()?;

        self.streamed += 1;
        Ok(())
    }

    /// Terminate the streamed JSON array
    ///
    /// Safe to call more than once; later calls and further `stream_result`
    /// calls are no-ops.
    pub fn close_stream(&mut self) -> Result<()> {
        let Some(streaming_file) = self.streaming_file.take() else {
            return Ok(());
        };

        let mut file = OpenOptions::new().append(true).open(&streaming_file)?;
        writeln!(file, "\n]")?;
        file.flush()?;
        debug!("Closed stream {:?} after {} results", streaming_file, self.streamed);
        Ok(())
    }

    /// Close the stream and write the final report
    pub fn finalize(&mut self, runs: &[RunResult], totals: &TotalResult) -> Result<()> {
        self.close_stream()?;

        let report = match self.format {
            OutputFormat::Json => render_json(runs, totals)?,
            OutputFormat::Text => render_text(runs, totals),
        };

        match self.output_file {
            Some(ref path) => {
                std::fs::write(path, report)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
                info!("Results written to: {:?}", path);
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{}", report.trim_end())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn run(id: usize, successes: u64, failures: u64, mean: f64, rate: f64) -> RunResult {
        RunResult {
            id,
            successes,
            failures,
            run_time: 1.0 + id as f64,
            latency_min: mean / 2.0,
            latency_max: mean * 2.0,
            latency_mean: mean,
            latency_p25: mean,
            latency_p50: mean,
            latency_p95: mean,
            latency_std_dev: 0.0,
            messages_per_second: rate,
        }
    }

    #[test]
    fn test_run_result_from_samples() {
        let result =
            RunResult::from_samples(3, 4, 1, Duration::from_secs(2), &[4.0, 1.0, 3.0, 2.0]);

        assert_eq!(result.id, 3);
        assert_eq!(result.total_messages(), 5);
        assert_eq!(result.run_time, 2.0);
        assert_eq!(result.messages_per_second, 2.0);
        assert_eq!(result.latency_min, 1.0);
        assert_eq!(result.latency_max, 4.0);
        assert_eq!(result.latency_mean, 2.5);
        assert_eq!(result.latency_p50, 2.0);
        assert_eq!(result.ratio(), 0.8);
    }

    #[test]
    fn test_run_result_without_successes() {
        let result = RunResult::from_samples(0, 0, 3, Duration::from_millis(5), &[]);

        assert_eq!(result.failures, 3);
        assert_eq!(result.messages_per_second, 0.0);
        assert_eq!(result.latency_min, 0.0);
        assert_eq!(result.latency_max, 0.0);
        assert_eq!(result.latency_mean, 0.0);
        assert_eq!(result.latency_std_dev, 0.0);
        assert_eq!(result.latency_p95, 0.0);
    }

    #[test]
    fn test_aggregate_sums_and_ratio() {
        let runs = vec![run(0, 8, 2, 4.0, 10.0), run(1, 10, 0, 6.0, 20.0)];
        let totals = aggregate(&runs, Duration::from_secs(3)).unwrap();

        assert_eq!(totals.successes, 18);
        assert_eq!(totals.failures, 2);
        assert_eq!(totals.ratio, 0.9);
        assert_eq!(totals.total_run_time, 3.0);
        assert_eq!(totals.avg_run_time, 1.5);
        assert_eq!(totals.latency_min, 2.0);
        assert_eq!(totals.latency_max, 12.0);
        assert_eq!(totals.latency_mean_avg, 5.0);
    }

    #[test]
    fn test_ratio_is_one_without_failures() {
        let runs = vec![run(0, 5, 0, 1.0, 1.0), run(1, 7, 0, 1.0, 1.0)];
        assert_eq!(aggregate(&runs, Duration::ZERO).unwrap().ratio, 1.0);
    }

    #[test]
    fn test_throughput_is_sum_of_client_rates() {
        let runs = vec![
            run(0, 1, 0, 1.0, 10.0),
            run(1, 1, 0, 2.0, 20.0),
            run(2, 1, 0, 3.0, 30.0),
        ];
        let totals = aggregate(&runs, Duration::from_secs(1)).unwrap();

        assert_eq!(totals.avg_messages_per_second, 20.0);
        assert_eq!(totals.total_messages_per_second, 60.0);
        assert_eq!(totals.p50_messages_per_second, 20.0);
        assert_eq!(totals.p95_messages_per_second, 30.0);
    }

    #[test]
    fn test_latency_is_statistic_of_client_means() {
        let runs = vec![
            run(0, 1, 0, 1.0, 1.0),
            run(1, 1, 0, 2.0, 1.0),
            run(2, 1, 0, 3.0, 1.0),
            run(3, 1, 0, 4.0, 1.0),
            run(4, 1, 0, 5.0, 1.0),
        ];
        let totals = aggregate(&runs, Duration::from_secs(1)).unwrap();

        assert_eq!(totals.latency_mean_avg, 3.0);
        assert_eq!(totals.latency_mean_p25, 1.0);
        assert_eq!(totals.latency_mean_p50, 3.0);
        assert_eq!(totals.latency_mean_p95, 5.0);
        assert!((totals.latency_mean_std_dev - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_empty_fails() {
        assert_eq!(
            aggregate(&[], Duration::from_secs(1)),
            Err(AggregateError::NoResults)
        );
    }

    #[test]
    fn test_json_report_layout() {
        let runs = vec![run(0, 2, 0, 1.0, 4.0)];
        let totals = aggregate(&runs, Duration::from_secs(1)).unwrap();
        let json = render_json(&runs, &totals).unwrap();

        assert!(json.contains("\n\t\"runs\""));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["runs"][0]["msgs_per_sec"], 4.0);
        assert_eq!(value["runs"][0]["msg_time_ps95"], 1.0);
        assert_eq!(value["totals"]["successes"], 2);
        assert_eq!(value["totals"]["total_msgs_per_sec"], 4.0);
    }

    #[test]
    fn test_text_report() {
        let runs = vec![run(0, 3, 1, 1.0, 4.0), run(1, 4, 0, 1.0, 4.0)];
        let totals = aggregate(&runs, Duration::from_secs(1)).unwrap();
        let text = render_text(&runs, &totals);

        assert!(text.contains("======= CLIENT 1 ======="));
        assert!(text.contains("Ratio:                 0.750 (3/4)"));
        assert!(text.contains("========= TOTAL (2) ========="));
        assert!(text.contains("Total Ratio:                 0.875 (7/8)"));
        assert!(text.contains("Total Bandwidth (msg/sec):   8.000"));
    }

    #[test]
    fn test_results_manager_writes_file_and_stream() {
        let output = NamedTempFile::new().unwrap();
        let stream = NamedTempFile::new().unwrap();
        let mut manager = ResultsManager::new(Some(output.path()), OutputFormat::Json);
        manager.enable_streaming(stream.path()).unwrap();

        let runs = vec![run(0, 1, 0, 1.0, 1.0), run(1, 1, 0, 1.0, 1.0)];
        for r in &runs {
            manager.stream_result(r).unwrap();
        }
        let totals = aggregate(&runs, Duration::from_secs(1)).unwrap();
        manager.finalize(&runs, &totals).unwrap();

        let streamed: Vec<RunResult> =
            serde_json::from_str(&std::fs::read_to_string(stream.path()).unwrap()).unwrap();
        assert_eq!(streamed, runs);

        let report: JsonReport =
            serde_json::from_str(&std::fs::read_to_string(output.path()).unwrap()).unwrap();
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.totals, totals);
    }

    #[test]
    fn test_closed_stream_is_valid_json() {
        let stream = NamedTempFile::new().unwrap();
        let mut manager = ResultsManager::new(None, OutputFormat::Json);
        manager.enable_streaming(stream.path()).unwrap();
        manager.close_stream().unwrap();
        manager.close_stream().unwrap();
        manager.stream_result(&run(0, 1, 0, 1.0, 1.0)).unwrap();

        let streamed: Vec<RunResult> =
            serde_json::from_str(&std::fs::read_to_string(stream.path()).unwrap()).unwrap();
        assert!(streamed.is_empty());
    }

    #[test]
    fn test_json_report_reads_back_exactly() {
        let runs = vec![RunResult::from_samples(
            0,
            3,
            0,
            Duration::from_micros(1_234_567),
            &[0.000208, 0.1 + 0.2, 1.0 / 3.0],
        )];
        let totals = aggregate(&runs, Duration::from_secs_f64(1.234_567_891)).unwrap();

        let report: JsonReport = serde_json::from_str(&render_json(&runs, &totals).unwrap()).unwrap();
        assert_eq!(report.runs, runs);
        assert_eq!(report.totals, totals);
    }
}
