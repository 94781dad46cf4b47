//! Pax profile suite.
//!
//! Profiles live at `pax/{uid}`. A signed-in user may read and write their
//! own profile but never the `is_supervisor` flag; supervisors may write any
//! profile.

use futures::future::BoxFuture;
use rulebench_core::{Write, fields};
use rulebench_harness::{CaseContext, CaseError, Expectation, FnCase, TestCase};
use serde_json::json;

type CaseResult<'a> = BoxFuture<'a, Result<(), CaseError>>;

pub fn cases() -> Vec<Box<dyn TestCase>> {
    vec![
        FnCase::boxed("require pax to log in before creating a profile", login_required),
        FnCase::boxed("only a supervisor may set is_supervisor", supervisor_flag),
        FnCase::boxed("pax may update their own profile", update_own_profile),
        FnCase::boxed("pax may only create their own profile", create_own_profile),
        FnCase::boxed("pax may only read their own profile", read_own_profile),
        FnCase::boxed("admin bypasses the rules", admin_bypass),
        FnCase::boxed("repeated profile updates keep the last write", update_last_write_wins),
        FnCase::boxed("reset leaves no profiles behind", reset_leaves_nothing),
        FnCase::boxed("batched writes to another profile are rejected", batch_cross_profile),
    ]
}

fn login_required(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let anon = ctx.anonymous_client().await?;
        ctx.expect_denied(anon.set("pax/alice", fields([("name", json!("Alice"))]))).await?;
        Ok(())
    })
}

fn supervisor_flag(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed(&admin, "pax/john", fields([("is_supervisor", json!(true))])).await?;

        let alice = ctx.user_client("alice").await?;
        let john = ctx.user_client("john").await?;
        let promote = || fields([("is_supervisor", json!(true))]);
        ctx.expect_denied(alice.set("pax/alice", promote())).await?;
        ctx.expect_allowed(john.set("pax/alice", promote())).await?;
        Ok(())
    })
}

fn update_own_profile(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed(&admin, "pax/alice", fields([("name", json!("Alice"))])).await?;

        let alice = ctx.user_client("alice").await?;
        let renamed = fields([("name", json!("Alice 2"))]);
        ctx.expect_allowed(alice.update("pax/alice", renamed)).await?;
        Ok(())
    })
}

fn create_own_profile(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_denied(alice.set("pax/bob", fields([("name", json!("Bob"))]))).await?;
        Ok(())
    })
}

fn read_own_profile(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_allowed(alice.get("pax/alice")).await?;
        ctx.expect_denied(alice.get("pax/bob")).await?;
        Ok(())
    })
}

fn admin_bypass(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        let promoted = || fields([("is_supervisor", json!(true))]);
        ctx.expect_allowed(admin.set("pax/bob", promoted())).await?;
        ctx.expect_allowed(admin.update("pax/bob", fields([("name", json!("Bob"))]))).await?;
        ctx.expect_allowed(admin.get("pax/bob")).await?;
        ctx.expect_allowed(admin.create("pax/carol", promoted())).await?;
        let writes = vec![
            Write::Set { path: "pax/dave".parse()?, fields: promoted() },
            Write::Delete { path: "pax/carol".parse()? },
        ];
        ctx.expect_allowed(admin.batch_write(writes)).await?;
        ctx.expect_allowed(admin.list("pax")).await?;
        ctx.expect_allowed(admin.delete("pax/bob")).await?;
        Ok(())
    })
}

fn update_last_write_wins(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed(&admin, "pax/alice", fields([("name", json!("Alice"))])).await?;

        let alice = ctx.user_client("alice").await?;
        for name in ["Alice 2", "Alice 2", "Alice 3"] {
            ctx.expect_allowed(alice.update("pax/alice", fields([("name", json!(name))]))).await?;
        }

        let stored = admin.get("pax/alice").await?;
        let name = stored.document().and_then(|d| d.get("name")).cloned();
        ctx.check(name == Some(json!("Alice 3")), "pax/alice keeps the last written name");
        Ok(())
    })
}

fn reset_leaves_nothing(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        let listed = admin.list("pax").await?;
        ctx.check(listed.documents().is_empty(), "pax is empty after reset");
        Ok(())
    })
}

fn batch_cross_profile(ctx: &mut CaseContext) -> CaseResult<'_> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed(&admin, "pax/bob", fields([("name", json!("Bob"))])).await?;

        let alice = ctx.user_client("alice").await?;
        let anon = ctx.anonymous_client().await?;
        let bob = "pax/bob".parse()?;
        ctx.expect_all(vec![
            (Expectation::Denied, alice.batch_write(vec![Write::Delete { path: bob }])),
            (Expectation::Denied, anon.get("pax/bob")),
        ])
        .await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_names_are_unique() {
        let cases = cases();
        let names: HashSet<&str> = cases.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), cases.len());
    }
}
