//! Test harness with a shared Postgres testcontainer.
//!
//! The container starts once per test binary. Each test gets its own
//! database with migrations applied, so a claim loop in one test can never
//! steal jobs created by another.

use anyhow::{Context, Result};
use scheduler_core::kernel::jobs::JobService;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container infrastructure, initialized on the first test.
struct SharedTestInfra {
    base_url: String,
    admin_pool: PgPool,
    // CREATE DATABASE clones a template; concurrent clones of the same
    // template fail, so creations are serialized.
    create_lock: tokio::sync::Mutex<()>,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Respect RUST_LOG when debugging tests; try_init avoids panicking
        // when another test binary already installed a subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let base_url = format!("postgresql://postgres:postgres@{}:{}", host, port);

        let admin_pool = PgPool::connect(&format!("{}/postgres", base_url))
            .await
            .context("Failed to connect to the admin database")?;

        Ok(Self {
            base_url,
            admin_pool,
            create_lock: tokio::sync::Mutex::new(()),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context: a fresh database on the shared container.
pub struct TestHarness {
    pub db_pool: PgPool,
    pub service: JobService,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_name = format!("test_{}", Uuid::new_v4().simple());
        {
            let _guard = infra.create_lock.lock().await;
            sqlx::raw_sql(&format!(r#"CREATE DATABASE "{}""#, db_name))
                .execute(&infra.admin_pool)
                .await
                .context("Failed to create test database")?;
        }

        let db_pool = PgPool::connect(&format!("{}/{}", infra.base_url, db_name))
            .await
            .context("Failed to connect to test database")?;

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            service: JobService::new(db_pool.clone()),
            db_pool,
        })
    }
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}
