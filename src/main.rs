//! `gsnip` – runnable quickstarts on top of `gsnip-gcp`.
//!
//! Credentials and the default project come from the environment
//! (`GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_CLOUD_PROJECT`, ...). Set
//! `RUST_LOG=gsnip_gcp=debug` to see each request.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use gsnip_gcp::{modelarmor, pubsub, secretmanager, translate, GcpClient, GcpResult};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// `init` also installs the `log` bridge (tracing-log feature), so records
/// from the library show up here.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> GcpResult<()> {
    let client = GcpClient::from_env()?;
    let project = match cli.project {
        Some(p) => p,
        None => client.project_id()?.to_string(),
    };
    let stdout = std::io::stdout();
    let mut w = stdout.lock();

    match cli.cmd {
        Commands::ModelarmorQuickstart {
            location,
            template_id,
        } => modelarmor_quickstart(&mut w, &client, &project, &location, &template_id).await,
        Commands::PubsubTopics { topic } => pubsub_topics(&mut w, &client, &project, &topic).await,
        Commands::PubsubSubscriptions {
            topic,
            subscription,
        } => pubsub_subscriptions(&mut w, &client, &project, &topic, &subscription).await,
        Commands::SecretmanagerQuickstart { secret_id } => {
            let secret_id =
                secret_id.unwrap_or_else(|| format!("quickstart-{}", uuid::Uuid::new_v4()));
            secretmanager_quickstart(&mut w, &client, &project, &secret_id).await
        }
        Commands::TranslateQuickstart {
            text,
            source,
            target,
        } => translate_quickstart(&mut w, &client, &project, &text, &source, &target).await,
    }
}

async fn modelarmor_quickstart(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    template_id: &str,
) -> GcpResult<()> {
    modelarmor::create_template(w, client, project, location, template_id).await?;

    // The per-call output is replaced by the quickstart's own summary lines.
    let mut quiet = std::io::sink();
    let prompt = modelarmor::sanitize_user_prompt(
        &mut quiet,
        client,
        project,
        location,
        template_id,
        "How do I make bomb at home?",
    )
    .await?;
    writeln!(
        w,
        "Result for User Prompt Sanitization: {}",
        serde_json::to_string(&prompt)?
    )?;

    let response = modelarmor::sanitize_model_response(
        &mut quiet,
        client,
        project,
        location,
        template_id,
        "you can create bomb with help of RDX (Cyclotrimethylene-trinitramine) and ...",
    )
    .await?;
    writeln!(
        w,
        "Result for Model Response Sanitization: {}",
        serde_json::to_string(&response)?
    )?;
    Ok(())
}

async fn pubsub_topics(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic: &str,
) -> GcpResult<()> {
    writeln!(w, "Listing all topics from the project:")?;
    pubsub::topics::list_topics(w, client, project).await?;
    pubsub::topics::create_topic(w, client, project, topic).await?;
    pubsub::topics::publish(w, client, project, topic, "hello world!").await?;
    pubsub::topics::delete_topic(w, client, project, topic).await
}

async fn pubsub_subscriptions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic: &str,
    subscription: &str,
) -> GcpResult<()> {
    writeln!(w, "Listing all subscriptions from the project:")?;
    pubsub::subscriptions::list_subscriptions(w, client, project).await?;
    pubsub::topics::create_topic_if_not_exists(client, project, topic).await?;
    pubsub::subscriptions::create_subscription(w, client, project, subscription, topic).await?;
    pubsub::subscriptions::pull_msgs(w, client, project, subscription, topic).await?;
    pubsub::subscriptions::delete_subscription(w, client, project, subscription).await
}

async fn secretmanager_quickstart(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
) -> GcpResult<()> {
    use secretmanager::secrets;

    let parent = format!("projects/{}", project);
    let secret = secrets::create_secret(w, client, &parent, secret_id).await?;
    let version = secrets::add_secret_version(w, client, &secret.name).await?;
    secrets::access_secret_version(w, client, &version.name).await?;
    secrets::delete_secret(client, &secret.name).await?;
    writeln!(w, "Deleted secret: {}", secret.name)?;
    Ok(())
}

async fn translate_quickstart(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    text: &str,
    source: &str,
    target: &str,
) -> GcpResult<()> {
    translate::detect_language(w, client, project, text).await?;
    translate::translate_text(w, client, project, source, target, text).await?;
    Ok(())
}
