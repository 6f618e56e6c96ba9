use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use starter::{
    AppState,
    cache::{CacheStore, ChaosControl, MemoryCacheStore, ReadThroughCache, RedisCacheStore},
    config::Config,
    database::{PgUserRepository, UserStore},
    rate_limit::{MonotonicClock, spawn_sweeper},
    router::{build_rate_limiter, create_router},
    telemetry::{init_metrics, init_tracing},
    user::UserDirectory,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    // 初始化日志
    init_tracing("info");

    if let Err(e) = run().await {
        tracing::error!("Server exited with error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    // 加载配置
    let config = Arc::new(Config::from_env()?);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    };

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'starter';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let user_store: Arc<dyn UserStore> = Arc::new(PgUserRepository::new(pool));

    // 未配置 Redis 时退回进程内缓存
    let cache_store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            tracing::info!("Using Redis cache store");
            Arc::new(RedisCacheStore::new(Arc::new(client)))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory cache store");
            Arc::new(MemoryCacheStore::new())
        }
    };

    let chaos = Arc::new(ChaosControl::new(config.chaos_cache_probability)?);
    let cache = Arc::new(ReadThroughCache::new(cache_store.clone(), chaos.clone()));
    let users = Arc::new(UserDirectory::new(
        user_store.clone(),
        cache,
        config.cache_ttl_secs,
    ));

    if let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password) {
        users.ensure_admin(email, password).await?;
    }

    // 设置限流器和后台清理任务
    let limiter = Arc::new(build_rate_limiter(&config, Arc::new(MonotonicClock::default())));
    spawn_sweeper(limiter.clone(), config.rate_limit_sweep_interval());

    let state = AppState {
        config: config.clone(),
        users,
        user_store,
        cache_store,
        chaos,
        metrics,
    };

    let app = create_router(state, limiter);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
