use crate::model::{OutputConfig, OutputFormat, ProbeOutcome, ProbeRecord};
use std::io::{BufWriter, Write};

pub struct OutputSink {
    cfg: OutputConfig,
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl OutputSink {
    pub fn stdout(cfg: OutputConfig) -> Self {
        Self::new(cfg, Box::new(std::io::stdout()))
    }

    pub fn new(cfg: OutputConfig, writer: Box<dyn Write + Send>) -> Self {
        Self {
            cfg,
            writer: BufWriter::new(writer),
        }
    }

    pub fn write_record(&mut self, record: &ProbeRecord) -> anyhow::Result<()> {
        match self.cfg.format {
            OutputFormat::Jsonl => {
                let line = serde_json::to_string(record)?;
                writeln!(self.writer, "{line}")?;
            }
            OutputFormat::Pretty => match &record.outcome {
                ProbeOutcome::Alive(res) => {
                    writeln!(self.writer, "{} {} -> alive", res.address, res.port)?;
                    writeln!(self.writer, "  message: {}", res.message)?;
                    writeln!(
                        self.writer,
                        "  location: {} {} ({}) colo {}",
                        res.country_flag, res.country_name, res.country_code, res.colo
                    )?;
                    writeln!(
                        self.writer,
                        "  network: AS{} {} via {}",
                        res.asn, res.as_organization, res.http_protocol
                    )?;
                    writeln!(self.writer, "  delay: {} ms", res.delay_ms)?;
                }
                ProbeOutcome::Failed(failure) => {
                    writeln!(
                        self.writer,
                        "{} {} -> failed",
                        failure.address, failure.port
                    )?;
                    writeln!(self.writer, "  error: [{}] {}", failure.kind, failure.error)?;
                }
            },
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}
