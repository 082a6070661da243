use bilimusic_core::{AudioFormat, Config, ExtractionRequest};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bilimusic")]
#[command(author, version, about = "Extract audio from Bilibili videos")]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bilibili video URL (shorthand for `extract <URL>`)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    #[command(flatten)]
    pub options: ExtractOptions,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract audio from a video URL
    Extract {
        /// Video URL, e.g. https://www.bilibili.com/video/BVxxxxx
        url: String,

        #[command(flatten)]
        options: ExtractOptions,
    },

    /// Run the web front end
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for extracted files
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Check that ffmpeg and yt-dlp can be found
    Doctor,

    /// Show configuration
    Config,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct ExtractOptions {
    /// Output directory [default: current directory]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Audio format [default: mp3]
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Quality, 0 = best, 9 = smallest [default: 0]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub quality: Option<u8>,
}

impl ExtractOptions {
    /// Command line values win over configured defaults
    pub fn to_request(&self, url: &str, config: &Config) -> ExtractionRequest {
        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.directory.clone());
        let format = self.format.map(AudioFormat::from).unwrap_or(config.output.format);
        let quality = self.quality.unwrap_or(config.output.quality);

        ExtractionRequest::new(url, output_dir)
            .with_format(format)
            .with_quality(quality)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    /// MP3 - widely compatible
    Mp3,
    /// M4A - AAC in an MP4 container
    M4a,
    /// AAC - raw ADTS stream
    Aac,
}

impl From<FormatArg> for AudioFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Mp3 => AudioFormat::Mp3,
            FormatArg::M4a => AudioFormat::M4a,
            FormatArg::Aac => AudioFormat::Aac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_url_with_options() {
        let cli = Cli::try_parse_from([
            "bilimusic",
            "https://www.bilibili.com/video/BV1xy411c7mD",
            "-o",
            "music",
            "-f",
            "m4a",
            "-q",
            "3",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        let request = cli
            .options
            .to_request(cli.url.as_deref().unwrap(), &Config::default());
        assert_eq!(request.output_dir, PathBuf::from("music"));
        assert_eq!(request.format, AudioFormat::M4a);
        assert_eq!(request.quality, 3);
    }

    #[test]
    fn test_defaults_come_from_config() {
        let cli = Cli::try_parse_from(["bilimusic", "extract", "https://www.bilibili.com/video/BV1"]).unwrap();
        let Some(Commands::Extract { url, options }) = cli.command else {
            panic!("expected extract");
        };
        let request = options.to_request(&url, &Config::default());
        assert_eq!(request.output_dir, PathBuf::from("."));
        assert_eq!(request.format, AudioFormat::Mp3);
        assert_eq!(request.quality, 0);
    }

    #[test]
    fn test_rejects_bad_format_and_quality() {
        assert!(Cli::try_parse_from(["bilimusic", "https://x", "-f", "flac"]).is_err());
        assert!(Cli::try_parse_from(["bilimusic", "https://x", "-q", "10"]).is_err());
    }
}
