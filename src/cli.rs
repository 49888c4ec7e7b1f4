use anyhow::Context as _;
use futures::prelude::*;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use crate::rpc::{EndpointResponse, EndpointTable};
use crate::{Client, Config};

pub async fn main() -> anyhow::Result<()> {
    let args = Cli::from_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.options.debug { "info" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    args.command.run(args.options).await
}

/// Interact with an APEX gateway
#[derive(StructOpt)]
#[structopt(name = "apexc", max_term_width = 100)]
struct Cli {
    #[structopt(subcommand)]
    command: Command,

    #[structopt(flatten)]
    options: Options,
}

#[derive(StructOpt)]
struct Options {
    /// WebSocket URL of the gateway. Defaults to the APEX QA gateway.
    #[structopt(long)]
    url: Option<String>,

    /// Log every frame sent and received to stderr
    #[structopt(long)]
    debug: bool,
}

impl Options {
    fn config(&self) -> Config {
        let config = match self.url {
            Some(ref url) => Config::new(url.as_str()),
            None => Config::default(),
        };
        config.debug(self.debug)
    }

    async fn client(&self) -> anyhow::Result<Client> {
        let config = self.config();
        let url = config.url().to_owned();
        let client = Client::new(config);
        client
            .open_connection()
            .await
            .context(format!("Failed to connect to {}", url))?;
        Ok(client)
    }
}

#[derive(StructOpt)]
enum Command {
    Endpoints(Endpoints),
    Call(Call),
    Watch(Watch),
}

impl Command {
    async fn run(&self, options: Options) -> anyhow::Result<()> {
        match self {
            Self::Endpoints(cmd) => cmd.run(options),
            Self::Call(cmd) => cmd.run(options).await,
            Self::Watch(cmd) => cmd.run(options).await,
        }
    }
}

#[derive(StructOpt)]
/// List the endpoint names that can be called
struct Endpoints {}

impl Endpoints {
    fn run(&self, options: Options) -> anyhow::Result<()> {
        let table = EndpointTable::new(options.config().endpoint_names());
        for name in table.names() {
            println!("{}", name);
        }
        Ok(())
    }
}

#[derive(StructOpt)]
/// Call an endpoint and print the response
struct Call {
    /// Name of the endpoint, for example GetProducts
    endpoint: String,

    /// JSON parameters. Defaults to {"OMSId":1}
    #[structopt(parse(try_from_str = parse_json))]
    params: Option<serde_json::Value>,
}

impl Call {
    async fn run(&self, options: Options) -> anyhow::Result<()> {
        let table = EndpointTable::new(options.config().endpoint_names());
        if !table.contains(&self.endpoint) {
            anyhow::bail!("Unknown endpoint {}", self.endpoint);
        }

        let client = options.client().await?;
        let response = client
            .invoke(&self.endpoint, self.params.clone())
            .await
            .context(format!("Call to {} failed", self.endpoint))?;
        client.close_connection();

        match response {
            EndpointResponse::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            EndpointResponse::Raw(payload) => println!("{}", payload),
            EndpointResponse::Frame(frame) => println!("{}", frame),
        }
        Ok(())
    }
}

#[derive(StructOpt)]
/// Print events from one of the event streams
struct Watch {
    /// One of level1, level2, trades, ticker, order-events, account-events or
    /// frames
    stream: StreamName,

    /// Endpoint to call after subscribing, for example SubscribeLevel1
    #[structopt(long)]
    subscribe: Option<String>,

    /// JSON parameters for the --subscribe call
    #[structopt(long, parse(try_from_str = parse_json))]
    params: Option<serde_json::Value>,

    /// Exit after this many events
    #[structopt(long)]
    count: Option<usize>,
}

impl Watch {
    async fn run(&self, options: Options) -> anyhow::Result<()> {
        let client = options.client().await?;
        let count = self.count.unwrap_or(usize::MAX);

        // Streams only see events after subscribing so this has to happen
        // before the subscribe call.
        let events: stream::BoxStream<'static, String> = match self.stream {
            StreamName::Level1 => client.level1().map(|e| format!("{:?}", e)).boxed(),
            StreamName::Level2 => client.level2().map(|e| format!("{:?}", e)).boxed(),
            StreamName::Trades => client.trades().map(|e| format!("{:?}", e)).boxed(),
            StreamName::Ticker => client.ticker().map(|e| e.to_string()).boxed(),
            StreamName::OrderEvents => client.order_events().map(|e| format!("{:?}", e)).boxed(),
            StreamName::AccountEvents => client.account_events().map(|e| e.to_string()).boxed(),
            StreamName::Frames => client.frames().map(|e| e.to_string()).boxed(),
        };

        if let Some(ref endpoint) = self.subscribe {
            let response = client
                .invoke(endpoint, self.params.clone())
                .await
                .context(format!("Call to {} failed", endpoint))?;
            tracing::info!(?response, "subscribed");
        }

        let mut events = events.take(count);
        while let Some(event) = events.next().await {
            println!("{}", event);
        }
        client.close_connection();
        Ok(())
    }
}

fn parse_json(value: &str) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamName {
    Level1,
    Level2,
    Trades,
    Ticker,
    OrderEvents,
    AccountEvents,
    Frames,
}

impl std::str::FromStr for StreamName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "level1" => Self::Level1,
            "level2" => Self::Level2,
            "trades" => Self::Trades,
            "ticker" => Self::Ticker,
            "order-events" => Self::OrderEvents,
            "account-events" => Self::AccountEvents,
            "frames" => Self::Frames,
            _ => anyhow::bail!("Unknown stream {}", s),
        })
    }
}
