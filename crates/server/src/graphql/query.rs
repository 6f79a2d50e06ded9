use async_graphql::{Context, Object, ID};

use super::{app_state, require_caller};
use crate::characters::{self, Character};
use crate::error::GqlResultExt;
use crate::models::Yapper;

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Every registered profile
    async fn yappers(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Yapper>> {
        app_state(ctx)?.profiles.list().await.extended()
    }

    async fn yapper(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Yapper> {
        app_state(ctx)?.profiles.get(&id).await.extended()
    }

    /// Profile of the authenticated caller
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?.profiles.get(caller.id()).await.extended()
    }

    async fn characters(&self) -> Vec<Character> {
        characters::all().to_vec()
    }

    async fn character(&self, id: ID) -> Option<Character> {
        characters::find(&id).cloned()
    }
}
