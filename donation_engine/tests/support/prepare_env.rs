use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

pub fn random_db_url() -> String {
    let path = std::env::temp_dir().join(format!("donations_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn drop_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
}
