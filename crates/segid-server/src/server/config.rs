use core::time::Duration;

use anyhow::bail;
use clap::Parser;
use segid::AllocatorConfig;

/// Store target meaning "keep counters in process memory".
pub const MEMORY_STORE: &str = "memory";

/// Runtime configuration for the `segid-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first, if present). Defaults reproduce the classic segment
/// layout: ranges of 1000 IDs under the `default` tag, prefetched at 80%.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "segid-server",
    version,
    about = "An HTTP service handing out unique, increasing 64-bit IDs"
)]
pub struct CliArgs {
    /// Interface to bind.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Where range counters live: `memory`, or a `mongodb://` /
    /// `mongodb+srv://` connection string (requires the `mongodb` feature).
    ///
    /// The memory store restarts from zero with the process, so it is only
    /// suitable for development.
    ///
    /// Environment variable: `STORE`
    #[arg(long, env = "STORE", default_value_t = String::from(MEMORY_STORE))]
    pub store: String,

    /// Database holding the counter collection (MongoDB only).
    ///
    /// Environment variable: `MONGO_DATABASE`
    #[arg(long, env = "MONGO_DATABASE", default_value_t = String::from("test"))]
    pub mongo_database: String,

    /// Collection holding one counter document per tag (MongoDB only).
    ///
    /// Environment variable: `MONGO_COLLECTION`
    #[arg(long, env = "MONGO_COLLECTION", default_value_t = String::from("segments"))]
    pub mongo_collection: String,

    /// Business tag partitioning the counter namespace.
    ///
    /// Environment variable: `BIZ_TAG`
    #[arg(long = "biz", env = "BIZ_TAG", default_value_t = String::from("default"))]
    pub biz_tag: String,

    /// Number of IDs reserved from the store per round trip.
    ///
    /// Environment variable: `STEP`
    #[arg(long, env = "STEP", default_value_t = segid::DEFAULT_STEP)]
    pub step: i64,

    /// Fraction of the active segment consumed before the next one is
    /// prefetched, in `(0, 1]`.
    ///
    /// Environment variable: `PREFETCH_THRESHOLD`
    #[arg(long, env = "PREFETCH_THRESHOLD", default_value_t = segid::DEFAULT_PREFETCH_THRESHOLD)]
    pub prefetch_threshold: f64,

    /// Upper bound on one store round trip, in milliseconds.
    ///
    /// Environment variable: `STORE_TIMEOUT_MS`
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 3000)]
    pub store_timeout_ms: u64,

    /// Store round trips tried before a blocking refill gives up.
    ///
    /// Environment variable: `REFILL_ATTEMPTS`
    #[arg(long, env = "REFILL_ATTEMPTS", default_value_t = segid::DEFAULT_REFILL_ATTEMPTS)]
    pub refill_attempts: usize,

    /// Linear backoff base between failed refills, in milliseconds.
    ///
    /// Environment variable: `BACKOFF_MS`
    #[arg(long, env = "BACKOFF_MS", default_value_t = 100)]
    pub backoff_ms: u64,

    /// Segment switches a single request may perform before failing.
    ///
    /// Environment variable: `MAX_SWITCH_RETRIES`
    #[arg(long, env = "MAX_SWITCH_RETRIES", default_value_t = segid::DEFAULT_MAX_SWITCH_RETRIES)]
    pub max_switch_retries: usize,

    /// Largest `count` honored by `/batch`. Larger requests get one ID.
    ///
    /// Environment variable: `MAX_BATCH`
    #[arg(long, env = "MAX_BATCH", default_value_t = 1000)]
    pub max_batch: usize,
}

/// Backing store selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Memory,
    Mongo {
        uri: String,
        database: String,
        collection: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub store: StoreTarget,
    pub allocator: AllocatorConfig,
    pub max_batch: usize,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.host.is_empty() {
            bail!("HOST must not be empty");
        }

        if args.max_batch == 0 {
            bail!("MAX_BATCH must be greater than 0");
        }

        let store = if args.store.eq_ignore_ascii_case(MEMORY_STORE) {
            StoreTarget::Memory
        } else if args.store.starts_with("mongodb://") || args.store.starts_with("mongodb+srv://")
        {
            if !cfg!(feature = "mongodb") {
                bail!("STORE is a MongoDB URI but the `mongodb` feature is not enabled");
            }
            StoreTarget::Mongo {
                uri: args.store,
                database: args.mongo_database,
                collection: args.mongo_collection,
            }
        } else {
            bail!(
                "STORE must be `{MEMORY_STORE}` or a MongoDB connection string, got `{}`",
                args.store
            );
        };

        let allocator = AllocatorConfig::new(args.biz_tag)
            .with_step(args.step)
            .with_prefetch_threshold(args.prefetch_threshold)
            .with_store_timeout(Duration::from_millis(args.store_timeout_ms))
            .with_refill_attempts(args.refill_attempts)
            .with_backoff_base(Duration::from_millis(args.backoff_ms))
            .with_max_switch_retries(args.max_switch_retries);
        allocator.validate()?;

        Ok(Self {
            server_addr: format!("{}:{}", args.host, args.port),
            store,
            allocator,
            max_batch: args.max_batch,
        })
    }
}
