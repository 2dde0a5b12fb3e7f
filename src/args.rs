use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use frame_bus::PipeError;

use crate::config::PipeConfig;

pub const USAGE: &str = "\
VSPipe
Write to stdout: vspipe script.json - [options]
Write to file: vspipe script.json <outfile> [options]
Available options:
Select output index: -index N (default: 0)
Set number of concurrent frame requests: -requests N (default: number of threads)
Add YUV4MPEG headers: -y4m (default: off)
";

/// Single-dash spellings accepted alongside clap's `--` forms.
const SHORT_LONG_FLAGS: [&str; 3] = ["-index", "-requests", "-y4m"];

#[derive(Parser, Debug)]
#[command(
    name = "vspipe",
    about = "Stream the frames of a script output as raw video or YUV4MPEG2"
)]
pub struct Args {
    /// Script file to evaluate
    pub script: Option<PathBuf>,

    /// Output file, `-` for stdout
    pub output: Option<String>,

    /// Output node index
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub index: i64,

    /// Concurrent frame requests (default: number of engine threads)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub requests: i64,

    /// Add YUV4MPEG2 headers
    #[arg(long)]
    pub y4m: bool,
}

impl Args {
    pub fn parse_normalized<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize(args))
    }

    /// Both positionals were given.
    pub fn is_complete(&self) -> bool {
        self.script.is_some() && self.output.is_some()
    }

    pub fn into_config(self) -> Result<PipeConfig, PipeError> {
        let mut builder = PipeConfig::builder()
            .index(self.index)
            .requests(self.requests)
            .y4m(self.y4m);
        if let Some(script) = self.script {
            builder = builder.script(script);
        }
        if let Some(output) = self.output {
            builder = builder.output(&output);
        }
        builder.build()
    }
}

fn normalize<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            match SHORT_LONG_FLAGS.iter().find(|flag| arg.as_os_str() == **flag) {
                Some(flag) => OsString::from(format!("-{}", flag)),
                None => arg,
            }
        })
        .collect()
}
