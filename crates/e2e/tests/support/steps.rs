//! Step vocabulary bound to the scenario context

use catalog_e2e::{E2eError, E2eResult, ProductRow};
use catalog_store::{ProductFilter, RecordKind};
use cucumber::gherkin::Step;
use cucumber::{given, then, when};

use super::world::CatalogWorld;

// ============================================================================
// Data setup
// ============================================================================

#[given(expr = "there is an admin user {string} with password {string}")]
fn admin_user(world: &mut CatalogWorld, username: String, password: String) -> E2eResult<()> {
    world.ctx().create_actor(&username, &password)?;
    Ok(())
}

#[given("I am logged in as an admin")]
async fn logged_in_as_admin(world: &mut CatalogWorld) -> E2eResult<()> {
    world.ctx().login_as_admin().await
}

#[given(expr = "there is/are {int} product(s)")]
fn there_are_products(world: &mut CatalogWorld, count: usize) -> E2eResult<()> {
    world.ctx().there_are_products(count)?;
    Ok(())
}

#[given(expr = "I author {int} product(s)")]
fn author_products(world: &mut CatalogWorld, count: usize) -> E2eResult<()> {
    world.ctx().author_products(count)?;
    Ok(())
}

#[given("the following products exist:")]
fn following_products(world: &mut CatalogWorld, step: &Step) -> E2eResult<()> {
    let table = step
        .table
        .as_ref()
        .ok_or_else(|| E2eError::InvalidTable("step has no data table".to_string()))?;
    let rows = ProductRow::from_table(&table.rows)?;
    world.ctx().declare_products_from_table(&rows)?;
    Ok(())
}

// ============================================================================
// Navigation and interaction
// ============================================================================

#[given(expr = "I am on {string}")]
async fn on_page(world: &mut CatalogWorld, path: String) -> E2eResult<()> {
    world.ctx().visit(&path).await
}

#[when(expr = "I go to {string}")]
async fn go_to(world: &mut CatalogWorld, path: String) -> E2eResult<()> {
    world.ctx().visit(&path).await
}

#[when(expr = "I fill in the search box with {string}")]
async fn fill_search_box(world: &mut CatalogWorld, term: String) -> E2eResult<()> {
    world.ctx().fill_search_box(&term).await
}

#[when("I press the search button")]
async fn press_search_button(world: &mut CatalogWorld) -> E2eResult<()> {
    world.ctx().press_search_button().await
}

#[when(expr = "I click {string}")]
async fn click_link(world: &mut CatalogWorld, name: String) -> E2eResult<()> {
    world.ctx().click_link(&name).await
}

#[when(expr = "I press {string} in the {string} row")]
async fn press_in_row(world: &mut CatalogWorld, button: String, row: String) -> E2eResult<()> {
    world.ctx().press_button_in_row(&row, &button).await
}

#[when("I wait for the modal to load")]
async fn wait_for_modal(world: &mut CatalogWorld) -> E2eResult<()> {
    world.ctx().wait_for_modal_visible().await
}

#[when(expr = "(I )break")]
async fn break_here(world: &mut CatalogWorld) -> E2eResult<()> {
    world.ctx().break_for_debugging().await
}

#[when(expr = "I save a screenshot to {string}")]
async fn save_screenshot(world: &mut CatalogWorld, filename: String) -> E2eResult<()> {
    world.ctx().save_screenshot(&filename).await?;
    Ok(())
}

// ============================================================================
// Assertions
// ============================================================================

#[then(expr = "I should see {int} product(s)")]
async fn should_see_products(world: &mut CatalogWorld, count: usize) -> E2eResult<()> {
    world.ctx().assert_product_count(count).await
}

#[then(expr = "I should be on {string}")]
async fn should_be_on(world: &mut CatalogWorld, path: String) -> E2eResult<()> {
    world.ctx().assert_current_path(&path).await
}

#[then(expr = "the {string} row should have a check mark")]
async fn row_has_check_mark(world: &mut CatalogWorld, text: String) -> E2eResult<()> {
    world.ctx().row_has_check_mark(&text).await
}

#[then(expr = "the {string} row should not have a check mark")]
async fn row_lacks_check_mark(world: &mut CatalogWorld, text: String) -> E2eResult<()> {
    world.ctx().row_lacks_check_mark(&text).await
}

#[then(expr = "there should be {int} product(s) in the store")]
fn products_in_store(world: &mut CatalogWorld, expected: usize) -> E2eResult<()> {
    let actual = world.ctx().store().count(RecordKind::Product)?;
    if actual == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed {
            what: "stored products".to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[then(expr = "{int} product(s) should be published")]
fn published_in_store(world: &mut CatalogWorld, expected: usize) -> E2eResult<()> {
    let filter = ProductFilter {
        published_only: true,
        ..Default::default()
    };
    let actual = world.ctx().store().list_products(&filter)?.len();
    if actual == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed {
            what: "published products".to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[then(expr = "the fixtures should have been loaded")]
fn fixtures_loaded(world: &mut CatalogWorld) -> E2eResult<()> {
    match world.setup.as_ref().and_then(|s| s.fixtures.as_ref()) {
        Some(report) if !report.fixtures.is_empty() => Ok(()),
        _ => Err(E2eError::AssertionFailed {
            what: "fixture load".to_string(),
            expected: "at least one fixture".to_string(),
            actual: "none".to_string(),
        }),
    }
}
