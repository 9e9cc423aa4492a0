use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;

use quill_db::Database;
use quill_db::models::{NovelRow, UserRow};
use quill_types::api::RoleForm;
use quill_types::models::{AggregateStats, NovelStatus, Role};

use crate::auth::AppState;
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Level};
use crate::guard::{Capability, require};
use crate::middleware::Session;
use crate::views;

const ADMIN: &str = "/admin";

pub struct Overview {
    pub users: Vec<UserRow>,
    pub novels: Vec<NovelRow>,
    pub stats: AggregateStats,
}

/// Site-wide listing. Datasets are small, so role and status counts are
/// tallied in memory.
pub fn overview(db: &Database, session: &Session) -> Result<Overview, AppError> {
    require(session, Capability::Admin)?;
    let users = db.list_users()?;
    let novels = db.list_novels()?;

    let count_role = |role: Role| users.iter().filter(|u| u.role == role).count();
    let count_status = |status: NovelStatus| novels.iter().filter(|n| n.status == status).count();
    let stats = AggregateStats {
        total_users: users.len(),
        total_novels: novels.len(),
        total_chapters: db.count_chapters(None)?,
        total_comments: db.count_comments(None)?,
        reader_count: count_role(Role::Reader),
        admin_count: count_role(Role::Admin),
        super_admin_count: count_role(Role::SuperAdmin),
        ongoing_novels: count_status(NovelStatus::Ongoing),
        completed_novels: count_status(NovelStatus::Completed),
    };

    Ok(Overview { users, novels, stats })
}

/// Re-checked here even though the route is admin-gated: only a super admin
/// may reassign roles. Unknown role names are rejected.
pub fn change_user_role(
    db: &Database,
    session: &Session,
    target_user_id: i64,
    new_role: &str,
) -> Result<UserRow, AppError> {
    require(session, Capability::SuperAdmin)?;
    let role: Role = new_role
        .trim()
        .parse()
        .map_err(|e: quill_types::models::UnknownRole| AppError::validation(e.to_string()))?;

    if !db.update_user_role(target_user_id, role)? {
        return Err(AppError::NotFound("user"));
    }
    let user = db.get_user_by_id(target_user_id)?.ok_or(AppError::NotFound("user"))?;
    info!("User {} set role of {} to {}", session.username, user.username, role);
    Ok(user)
}

// -- Handlers --

pub async fn dashboard_page(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let overview = overview(&state.db, &session)?;
    Ok(views::render(jar, Some(&session), "Administration", views::admin(&overview, &session)))
}

pub async fn change_role_submit(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<RoleForm>,
) -> Result<Response, PageError> {
    let user = change_user_role(&state.db, &session, user_id, &form.role).or_back(ADMIN)?;
    let jar = flash::push(jar, Level::Success, format!("{} is now {}", user.username, user.role));
    Ok((jar, Redirect::to(ADMIN)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_db::models::{ChapterDraft, NovelUpdate};

    use crate::guard::session_for;

    #[test]
    fn only_super_admin_changes_roles() {
        let db = Database::open_in_memory().unwrap();
        let bob = db.create_user("bob", "b@x.com", "h", Role::Reader).unwrap();
        let admin = session_for(db.create_user("mod", "m@x.com", "h", Role::Admin).unwrap(), Role::Admin);
        let root = session_for(
            db.create_user("root", "r@x.com", "h", Role::SuperAdmin).unwrap(),
            Role::SuperAdmin,
        );

        let err = change_user_role(&db, &admin, bob, "admin").unwrap_err();
        assert!(matches!(err, AppError::AuthorizationDenied));
        assert_eq!(db.get_user_by_id(bob).unwrap().unwrap().role, Role::Reader);

        let user = change_user_role(&db, &root, bob, "admin").unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(db.get_user_by_id(bob).unwrap().unwrap().role, Role::Admin);
    }

    #[test]
    fn unknown_role_and_missing_user() {
        let db = Database::open_in_memory().unwrap();
        let bob = db.create_user("bob", "b@x.com", "h", Role::Reader).unwrap();
        let root = session_for(
            db.create_user("root", "r@x.com", "h", Role::SuperAdmin).unwrap(),
            Role::SuperAdmin,
        );

        assert!(matches!(change_user_role(&db, &root, bob, "moderator"), Err(AppError::Validation(_))));
        assert!(matches!(change_user_role(&db, &root, 999, "admin"), Err(AppError::NotFound("user"))));
    }

    #[test]
    fn overview_tallies_roles_and_statuses() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "a@x.com", "h", Role::Reader).unwrap();
        let admin_id = db.create_user("mod", "m@x.com", "h", Role::Admin).unwrap();
        let a = db.create_novel(alice, "A", "", "").unwrap();
        let b = db.create_novel(alice, "B", "", "").unwrap();
        db.update_novel(
            b.id,
            &NovelUpdate { title: "B", description: "", status: NovelStatus::Completed, cover_image: "" },
        )
        .unwrap();
        db.create_chapter(a.id, &ChapterDraft { title: "1", content: "", author_note: "" }).unwrap();
        db.create_comment(a.id, alice, "hi", None).unwrap();

        let reader = session_for(alice, Role::Reader);
        assert!(matches!(overview(&db, &reader), Err(AppError::AuthorizationDenied)));

        let view = overview(&db, &session_for(admin_id, Role::Admin)).unwrap();
        assert_eq!(view.users.len(), 2);
        assert_eq!(
            view.stats,
            AggregateStats {
                total_users: 2,
                total_novels: 2,
                total_chapters: 1,
                total_comments: 1,
                reader_count: 1,
                admin_count: 1,
                super_admin_count: 0,
                ongoing_novels: 1,
                completed_novels: 1,
            }
        );
    }
}
