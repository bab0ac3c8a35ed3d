use crate::db::models::{
    DbAccountBinding, DbAdAccount, DbIngestionRecord, DbTokenRecord, MetricRow,
};
use crate::db::patch::{
    AdAccountUpsert, BindingUpsert, IngestionCreate, IngestionFinish, TokenCreate, TokenPatch,
    UpsertCounts,
};
use crate::db::queries;
use crate::db::schema::SQLITE_INIT;
use crate::error::AdsError;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Insert or replace the token for (user, company) and return its id.
    UpsertToken(TokenCreate, RpcReplyPort<Result<i64, AdsError>>),

    /// Look up a token by user and optional company.
    GetToken(
        String,
        Option<String>,
        RpcReplyPort<Result<Option<DbTokenRecord>, AdsError>>,
    ),

    /// All tokens of a user, most recently updated first.
    ListTokensForUser(String, RpcReplyPort<Result<Vec<DbTokenRecord>, AdsError>>),

    /// Patch a token record by id.
    PatchToken(i64, TokenPatch, RpcReplyPort<Result<(), AdsError>>),

    UpsertAdAccount(AdAccountUpsert, RpcReplyPort<Result<(), AdsError>>),

    /// Manager accounts known for a user.
    ListManagerAccounts(String, RpcReplyPort<Result<Vec<DbAdAccount>, AdsError>>),

    /// Client accounts whose owner holds a token.
    ListIngestableAccounts(RpcReplyPort<Result<Vec<DbAdAccount>, AdsError>>),

    GetBinding(
        String,
        String,
        RpcReplyPort<Result<Option<DbAccountBinding>, AdsError>>,
    ),

    UpsertBinding(BindingUpsert, RpcReplyPort<Result<(), AdsError>>),

    /// Open an ingestion run in `running` state and return its id.
    CreateIngestion(IngestionCreate, RpcReplyPort<Result<i64, AdsError>>),

    FinishIngestion(IngestionFinish, RpcReplyPort<Result<(), AdsError>>),

    GetIngestion(i64, RpcReplyPort<Result<DbIngestionRecord, AdsError>>),

    UpsertMetrics(Vec<MetricRow>, RpcReplyPort<Result<UpsertCounts, AdsError>>),

    ListMetrics(String, RpcReplyPort<Result<Vec<MetricRow>, AdsError>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn upsert_token(&self, create: TokenCreate) -> Result<i64, AdsError> {
        ractor::call!(self.actor, DbActorMessage::UpsertToken, create)
            .map_err(|e| AdsError::RactorError(format!("DbActor UpsertToken RPC failed: {e}")))?
    }

    pub async fn get_token(
        &self,
        user_id: &str,
        company_id: Option<&str>,
    ) -> Result<Option<DbTokenRecord>, AdsError> {
        ractor::call!(
            self.actor,
            DbActorMessage::GetToken,
            user_id.to_string(),
            company_id.map(str::to_string)
        )
        .map_err(|e| AdsError::RactorError(format!("DbActor GetToken RPC failed: {e}")))?
    }

    pub async fn list_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DbTokenRecord>, AdsError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ListTokensForUser,
            user_id.to_string()
        )
        .map_err(|e| AdsError::RactorError(format!("DbActor ListTokensForUser RPC failed: {e}")))?
    }

    pub async fn patch_token(&self, id: i64, patch: TokenPatch) -> Result<(), AdsError> {
        ractor::call!(self.actor, DbActorMessage::PatchToken, id, patch)
            .map_err(|e| AdsError::RactorError(format!("DbActor PatchToken RPC failed: {e}")))?
    }

    pub async fn upsert_ad_account(&self, account: AdAccountUpsert) -> Result<(), AdsError> {
        ractor::call!(self.actor, DbActorMessage::UpsertAdAccount, account).map_err(|e| {
            AdsError::RactorError(format!("DbActor UpsertAdAccount RPC failed: {e}"))
        })?
    }

    pub async fn list_manager_accounts(&self, user_id: &str) -> Result<Vec<DbAdAccount>, AdsError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ListManagerAccounts,
            user_id.to_string()
        )
        .map_err(|e| AdsError::RactorError(format!("DbActor ListManagerAccounts RPC failed: {e}")))?
    }

    pub async fn list_ingestable_accounts(&self) -> Result<Vec<DbAdAccount>, AdsError> {
        ractor::call!(self.actor, DbActorMessage::ListIngestableAccounts).map_err(|e| {
            AdsError::RactorError(format!("DbActor ListIngestableAccounts RPC failed: {e}"))
        })?
    }

    pub async fn get_binding(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<Option<DbAccountBinding>, AdsError> {
        ractor::call!(
            self.actor,
            DbActorMessage::GetBinding,
            user_id.to_string(),
            customer_id.to_string()
        )
        .map_err(|e| AdsError::RactorError(format!("DbActor GetBinding RPC failed: {e}")))?
    }

    pub async fn upsert_binding(&self, binding: BindingUpsert) -> Result<(), AdsError> {
        ractor::call!(self.actor, DbActorMessage::UpsertBinding, binding)
            .map_err(|e| AdsError::RactorError(format!("DbActor UpsertBinding RPC failed: {e}")))?
    }

    pub async fn create_ingestion(&self, create: IngestionCreate) -> Result<i64, AdsError> {
        ractor::call!(self.actor, DbActorMessage::CreateIngestion, create).map_err(|e| {
            AdsError::RactorError(format!("DbActor CreateIngestion RPC failed: {e}"))
        })?
    }

    pub async fn finish_ingestion(&self, finish: IngestionFinish) -> Result<(), AdsError> {
        ractor::call!(self.actor, DbActorMessage::FinishIngestion, finish).map_err(|e| {
            AdsError::RactorError(format!("DbActor FinishIngestion RPC failed: {e}"))
        })?
    }

    pub async fn get_ingestion(&self, id: i64) -> Result<DbIngestionRecord, AdsError> {
        ractor::call!(self.actor, DbActorMessage::GetIngestion, id)
            .map_err(|e| AdsError::RactorError(format!("DbActor GetIngestion RPC failed: {e}")))?
    }

    pub async fn upsert_metrics(&self, rows: Vec<MetricRow>) -> Result<UpsertCounts, AdsError> {
        ractor::call!(self.actor, DbActorMessage::UpsertMetrics, rows)
            .map_err(|e| AdsError::RactorError(format!("DbActor UpsertMetrics RPC failed: {e}")))?
    }

    pub async fn list_metrics(&self, customer_id: &str) -> Result<Vec<MetricRow>, AdsError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ListMetrics,
            customer_id.to_string()
        )
        .map_err(|e| AdsError::RactorError(format!("DbActor ListMetrics RPC failed: {e}")))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::UpsertToken(create, reply) => {
                let _ = reply.send(queries::upsert_token(pool, create).await);
            }
            DbActorMessage::GetToken(user_id, company_id, reply) => {
                let res = queries::get_token(pool, &user_id, company_id.as_deref()).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListTokensForUser(user_id, reply) => {
                let _ = reply.send(queries::list_tokens_for_user(pool, &user_id).await);
            }
            DbActorMessage::PatchToken(id, patch, reply) => {
                let _ = reply.send(queries::patch_token(pool, id, patch).await);
            }
            DbActorMessage::UpsertAdAccount(account, reply) => {
                let _ = reply.send(queries::upsert_ad_account(pool, account).await);
            }
            DbActorMessage::ListManagerAccounts(user_id, reply) => {
                let _ = reply.send(queries::list_manager_accounts(pool, &user_id).await);
            }
            DbActorMessage::ListIngestableAccounts(reply) => {
                let _ = reply.send(queries::list_ingestable_accounts(pool).await);
            }
            DbActorMessage::GetBinding(user_id, customer_id, reply) => {
                let _ = reply.send(queries::get_binding(pool, &user_id, &customer_id).await);
            }
            DbActorMessage::UpsertBinding(binding, reply) => {
                let _ = reply.send(queries::upsert_binding(pool, binding).await);
            }
            DbActorMessage::CreateIngestion(create, reply) => {
                let _ = reply.send(queries::create_ingestion(pool, create).await);
            }
            DbActorMessage::FinishIngestion(finish, reply) => {
                let _ = reply.send(queries::finish_ingestion(pool, finish).await);
            }
            DbActorMessage::GetIngestion(id, reply) => {
                let _ = reply.send(queries::get_ingestion(pool, id).await);
            }
            DbActorMessage::UpsertMetrics(rows, reply) => {
                let _ = reply.send(queries::upsert_metrics(pool, rows).await);
            }
            DbActorMessage::ListMetrics(customer_id, reply) => {
                let _ = reply.send(queries::list_metrics(pool, &customer_id).await);
            }
        }
        Ok(())
    }
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, AdsError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| AdsError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), AdsError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
