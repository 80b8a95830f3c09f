use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use invoicer_shared::clients::db::DbPool;

use super::{
    AuditStore, CredentialStore, MerchantStore, OtpStore, SessionStore, StoreError, StoreResult,
};
use crate::models::{
    CompanyMerchant, Merchant, NewAuditEntry, NewLoginMethod, NewOtp, NewSession, NewUser,
    NewUserRole, Otp, OtpPurpose, PersonMerchant, Session, User, SEED_ROLES,
};
use crate::schema::{
    company_merchants, merchants, otps, person_merchants, roles, stores, user_login_methods,
    user_logs, user_roles, user_sessions, users,
};

type Conn = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<Conn> {
        Ok(self.pool.get()?)
    }
}

fn username_conflict(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Conflict("username")
        }
        other => StoreError::Database(other),
    }
}

fn role_id(conn: &mut PgConnection, role: &str) -> StoreResult<i32> {
    roles::table
        .filter(roles::name.eq(role))
        .select(roles::id)
        .first::<i32>(conn)
        .optional()?
        .ok_or(StoreError::NotFound("role"))
}

fn insert_user_with_role(conn: &mut PgConnection, user: NewUser, role: &str) -> StoreResult<User> {
    let role_id = role_id(conn, role)?;
    let user: User = diesel::insert_into(users::table)
        .values(&user)
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(username_conflict)?;
    diesel::insert_into(user_roles::table)
        .values(&NewUserRole { user_id: user.id, role_id })
        .execute(conn)?;
    Ok(user)
}

impl CredentialStore for PgStore {
    fn create_user(&self, user: NewUser, role: &str) -> StoreResult<User> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| insert_user_with_role(conn, user, role))
    }

    fn create_oauth_user(
        &self,
        user: NewUser,
        role: &str,
        provider: &str,
        provider_uid: &str,
    ) -> StoreResult<User> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let user = insert_user_with_role(conn, user, role)?;
            diesel::insert_into(user_login_methods::table)
                .values(&NewLoginMethod {
                    user_id: user.id,
                    provider: provider.to_string(),
                    provider_uid: provider_uid.to_string(),
                })
                .execute(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        StoreError::Conflict("login method")
                    }
                    other => StoreError::Database(other),
                })?;
            Ok(user)
        })
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::username.eq(username))
            .filter(users::deleted_at.is_null())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::id.eq(id))
            .filter(users::deleted_at.is_null())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(diesel::select(diesel::dsl::exists(
            users::table.filter(users::username.eq(username)),
        ))
        .get_result(&mut conn)?)
    }

    fn user_by_login_method(&self, provider: &str, provider_uid: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(user_login_methods::table
            .inner_join(users::table)
            .filter(user_login_methods::provider.eq(provider))
            .filter(user_login_methods::provider_uid.eq(provider_uid))
            .filter(users::deleted_at.is_null())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    fn set_verified(&self, user_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((users::is_verified.eq(true), users::updated_at.eq(Utc::now())))
            .execute(&mut conn)?;
        Ok(())
    }

    fn assign_role(&self, user_id: Uuid, role: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let role_id = role_id(&mut conn, role)?;
        diesel::insert_into(user_roles::table)
            .values(&NewUserRole { user_id, role_id })
            .execute(&mut conn)?;
        Ok(())
    }

    fn primary_role(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        let mut conn = self.conn()?;
        Ok(user_roles::table
            .inner_join(roles::table)
            .filter(user_roles::user_id.eq(user_id))
            .order(user_roles::id.asc())
            .select(roles::name)
            .first::<String>(&mut conn)
            .optional()?)
    }

    fn seed_roles(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let rows: Vec<_> = SEED_ROLES
            .iter()
            .map(|(name, description)| (roles::name.eq(*name), roles::description.eq(Some(*description))))
            .collect();
        let inserted = diesel::insert_into(roles::table)
            .values(rows)
            .on_conflict(roles::name)
            .do_nothing()
            .execute(&mut conn)?;
        if inserted > 0 {
            tracing::info!(inserted, "seeded roles");
        }
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

impl SessionStore for PgStore {
    fn create_session(&self, session: NewSession) -> StoreResult<Session> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(user_sessions::table)
            .values(&session)
            .returning(Session::as_returning())
            .get_result(&mut conn)?)
    }

    fn session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let mut conn = self.conn()?;
        Ok(user_sessions::table
            .filter(user_sessions::token_hash.eq(token_hash))
            .select(Session::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn revoke_session(&self, token_hash: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            user_sessions::table
                .filter(user_sessions::token_hash.eq(token_hash))
                .filter(user_sessions::revoked.eq(false)),
        )
        .set(user_sessions::revoked.eq(true))
        .execute(&mut conn)?;
        Ok(updated == 1)
    }

    fn revoke_all_sessions(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            user_sessions::table
                .filter(user_sessions::user_id.eq(user_id))
                .filter(user_sessions::revoked.eq(false)),
        )
        .set(user_sessions::revoked.eq(true))
        .execute(&mut conn)?)
    }
}

impl OtpStore for PgStore {
    fn create_otp(&self, otp: NewOtp) -> StoreResult<Otp> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(otps::table)
            .values(&otp)
            .returning(Otp::as_returning())
            .get_result(&mut conn)?)
    }

    fn active_otp(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        reference: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Otp>> {
        let mut conn = self.conn()?;
        Ok(otps::table
            .filter(otps::destination.eq(destination))
            .filter(otps::purpose.eq(purpose.as_str()))
            .filter(otps::otp_ref.eq(reference))
            .filter(otps::used_at.is_null())
            .filter(otps::revoked_at.is_null())
            .filter(otps::expires_at.gt(now))
            .order((otps::created_at.desc(), otps::id.desc()))
            .select(Otp::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn increment_attempts(&self, id: i64) -> StoreResult<i32> {
        let mut conn = self.conn()?;
        diesel::update(otps::table.filter(otps::id.eq(id)))
            .set(otps::attempts.eq(otps::attempts + 1))
            .returning(otps::attempts)
            .get_result::<i32>(&mut conn)
            .optional()?
            .ok_or(StoreError::NotFound("otp"))
    }

    fn mark_otp_used(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            otps::table
                .filter(otps::id.eq(id))
                .filter(otps::used_at.is_null())
                .filter(otps::revoked_at.is_null()),
        )
        .set(otps::used_at.eq(Some(now)))
        .execute(&mut conn)?;
        Ok(updated == 1)
    }

    fn revoke_otp(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(otps::table.filter(otps::id.eq(id)).filter(otps::revoked_at.is_null()))
            .set(otps::revoked_at.eq(Some(now)))
            .execute(&mut conn)?;
        Ok(())
    }
}

impl AuditStore for PgStore {
    fn record(&self, entry: NewAuditEntry) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(user_logs::table)
            .values(&entry)
            .execute(&mut conn)?;
        Ok(())
    }
}

impl MerchantStore for PgStore {
    fn merchant_by_user(&self, user_id: Uuid) -> StoreResult<Option<Merchant>> {
        let mut conn = self.conn()?;
        Ok(merchants::table
            .filter(merchants::user_id.eq(user_id))
            .select(Merchant::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn person_detail(&self, merchant_id: Uuid) -> StoreResult<Option<PersonMerchant>> {
        let mut conn = self.conn()?;
        Ok(person_merchants::table
            .filter(person_merchants::merchant_id.eq(merchant_id))
            .select(PersonMerchant::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn company_detail(&self, merchant_id: Uuid) -> StoreResult<Option<CompanyMerchant>> {
        let mut conn = self.conn()?;
        Ok(company_merchants::table
            .filter(company_merchants::merchant_id.eq(merchant_id))
            .select(CompanyMerchant::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn has_store(&self, merchant_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(diesel::select(diesel::dsl::exists(
            stores::table.filter(stores::merchant_id.eq(merchant_id)),
        ))
        .get_result(&mut conn)?)
    }
}
