//! Read-only traffic mix for the order web app and its REST data API.
//!
//! Weights mirror the observed production mix: landing page and assets 30,
//! menu 35, a user's orders 20, the admin user list 10, completed order
//! ids 5. Only GETs are issued.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use vu_engine::{Action, Behavior, BehaviorCatalog, BoxFuture, EngineResult, Session};

use crate::config::ScenarioConfig;

pub const OP_HOME: &str = "GET /";
pub const OP_ASSET: &str = "GET /assets/[chunk]";
pub const OP_MENU_ITEMS: &str = "SB GET menu_items";
pub const OP_CUSTOM_OPTIONS: &str = "SB GET custom_options";
pub const OP_ORDERS_BY_USER: &str = "SB GET orders by user";
pub const OP_USERS_PAGINATED: &str = "SB GET users paginated";
pub const OP_COMPLETED_ORDER_IDS: &str = "SB GET orders completed ids";

const MENU_ITEMS_PATH: &str = "/menu_items?select=id,name,description,created_at&order=created_at.desc";
const CUSTOM_OPTIONS_PATH: &str = "/custom_options?select=*&order=order_position.asc";
const USERS_PATH: &str = "/users?select=id,email,full_name,role,created_at&order=created_at.desc";
const COMPLETED_ORDERS_PATH: &str = "/orders?select=id&status=eq.completed";

/// Build the catalog for the read-only mix.
pub fn read_only_mix(config: &ScenarioConfig) -> EngineResult<BehaviorCatalog> {
    let assets: Arc<[String]> = config.assets.clone().into();

    BehaviorCatalog::new()
        .with(Behavior::new("spa_and_assets", 30, SpaAndAssets { assets }))?
        .with(Behavior::new("menu_and_options", 35, menu_and_options))?
        .with(Behavior::new(
            "orders_by_user",
            20,
            OrdersByUser {
                user_id: config.test_user_id.clone(),
            },
        ))?
        .with(Behavior::new("users_admin_list", 10, users_admin_list))?
        .with(Behavior::new("completed_orders_ids", 5, completed_orders_ids))
}

/// Landing page followed by one or two distinct build assets.
struct SpaAndAssets {
    assets: Arc<[String]>,
}

impl Action for SpaAndAssets {
    fn run<'a>(&'a self, session: &'a mut Session) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            session.get("/", OP_HOME).await;

            let picked: Vec<&String> = {
                let rng = session.rng();
                let max = self.assets.len().min(2);
                if max == 0 {
                    Vec::new()
                } else {
                    let k = rng.gen_range(1..=max);
                    self.assets.choose_multiple(rng, k).collect()
                }
            };
            for asset in picked {
                session.get(asset, OP_ASSET).await;
            }
        })
    }
}

fn menu_and_options(session: &mut Session) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        session.data_get(MENU_ITEMS_PATH, OP_MENU_ITEMS, None).await;
        session
            .data_get(CUSTOM_OPTIONS_PATH, OP_CUSTOM_OPTIONS, None)
            .await;
    })
}

/// One page of a single user's orders, newest first.
struct OrdersByUser {
    user_id: Option<String>,
}

impl OrdersByUser {
    fn path(user_id: &str) -> String {
        format!("/orders?select=*&order=created_at.desc&user_id=eq.{user_id}")
    }
}

impl Action for OrdersByUser {
    fn run<'a>(&'a self, session: &'a mut Session) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(user_id) = self.user_id.as_deref() else {
                return;
            };
            let window = session.page_window();
            session
                .data_get(&Self::path(user_id), OP_ORDERS_BY_USER, Some(window))
                .await;
        })
    }
}

fn users_admin_list(session: &mut Session) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let window = session.page_window();
        session
            .data_get(USERS_PATH, OP_USERS_PAGINATED, Some(window))
            .await;
    })
}

fn completed_orders_ids(session: &mut Session) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let window = session.page_window();
        session
            .data_get(COMPLETED_ORDERS_PATH, OP_COMPLETED_ORDER_IDS, Some(window))
            .await;
    })
}
