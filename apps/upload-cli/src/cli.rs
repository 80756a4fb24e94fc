use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use oseh_content_upload::EntityScope;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload content files to Oseh")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file, reusing an existing copy when the server has one
    Upload {
        file: PathBuf,

        /// Collection the file belongs to
        #[arg(short, long, value_enum)]
        kind: ContentKind,

        /// Parts uploaded at once (defaults to the configured value)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// API origin (defaults to the configured value)
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Print the SHA-512 digest the server would key the file by
    Hash { file: PathBuf },
    /// Inspect or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Store the API origin
    SetApiUrl { url: String },
    /// Store the bearer token
    SetToken { token: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Audio,
    BackgroundImage,
    OnboardingVideo,
    HomeImage,
    CourseThumbnail,
}

impl ContentKind {
    pub fn scope(self) -> EntityScope {
        match self {
            Self::Audio => EntityScope::journey_audio_content(),
            Self::BackgroundImage => EntityScope::journey_background_image(),
            Self::OnboardingVideo => EntityScope::onboarding_video(),
            Self::HomeImage => EntityScope::home_screen_image(),
            Self::CourseThumbnail => EntityScope::course_video_thumbnail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload() {
        let cli = Cli::parse_from([
            "oseh-upload",
            "upload",
            "intro.mp3",
            "--kind",
            "audio",
            "-c",
            "3",
        ]);
        match cli.command {
            Command::Upload {
                file,
                kind,
                concurrency,
                api_url,
            } => {
                assert_eq!(file, PathBuf::from("intro.mp3"));
                assert_eq!(kind, ContentKind::Audio);
                assert_eq!(concurrency, Some(3));
                assert!(api_url.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn kinds_are_kebab_case() {
        let cli = Cli::parse_from([
            "oseh-upload",
            "-v",
            "upload",
            "bg.jpg",
            "--kind",
            "background-image",
        ]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Upload {
                kind: ContentKind::BackgroundImage,
                ..
            }
        ));
    }

    #[test]
    fn upload_requires_kind() {
        assert!(Cli::try_parse_from(["oseh-upload", "upload", "a.mp3"]).is_err());
    }

    #[test]
    fn parses_config_actions() {
        let cli = Cli::parse_from(["oseh-upload", "config", "set-token", "abc"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::SetToken { ref token }
            } if token == "abc"
        ));
    }

    #[test]
    fn kinds_map_to_collections() {
        assert_eq!(
            ContentKind::Audio.scope().collection_path,
            EntityScope::journey_audio_content().collection_path
        );
        assert_ne!(
            ContentKind::HomeImage.scope().collection_path,
            ContentKind::CourseThumbnail.scope().collection_path
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
