use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gsnip", version, about = "Run Google Cloud API quickstarts")]
pub struct Cli {
    /// Project to run against (defaults to the client's project)
    #[arg(long, global = true, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a template, then screen a prompt and a model response with it
    ModelarmorQuickstart {
        #[arg(long, default_value = "us-central1")]
        location: String,
        #[arg(long, default_value = "rust-template")]
        template_id: String,
    },

    /// List topics, then create, publish to, and delete example-topic
    PubsubTopics {
        #[arg(long, default_value = "example-topic")]
        topic: String,
    },

    /// List subscriptions, then create, pull from, and delete example-subscription
    PubsubSubscriptions {
        #[arg(long, default_value = "example-topic")]
        topic: String,
        #[arg(long, default_value = "example-subscription")]
        subscription: String,
    },

    /// Create a secret, add and read back a version, then delete it
    SecretmanagerQuickstart {
        /// Secret id; a random one is generated when omitted
        #[arg(long)]
        secret_id: Option<String>,
    },

    /// Detect and translate a piece of text
    TranslateQuickstart {
        #[arg(long, default_value = "Hello, world!")]
        text: String,
        #[arg(long, default_value = "en-US")]
        source: String,
        #[arg(long, default_value = "fr")]
        target: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommand_defaults() {
        let cli = Cli::try_parse_from(["gsnip", "pubsub-subscriptions"]).unwrap();
        match cli.cmd {
            Commands::PubsubSubscriptions {
                topic,
                subscription,
            } => {
                assert_eq!(topic, "example-topic");
                assert_eq!(subscription, "example-subscription");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn translate_overrides() {
        let cli = Cli::try_parse_from([
            "gsnip",
            "translate-quickstart",
            "--target",
            "ja",
            "--text",
            "good morning",
        ])
        .unwrap();
        match cli.cmd {
            Commands::TranslateQuickstart { text, source, target } => {
                assert_eq!(text, "good morning");
                assert_eq!(source, "en-US");
                assert_eq!(target, "ja");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
