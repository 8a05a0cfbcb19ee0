//! Goal and category-limit command implementations

use anyhow::Result;
use keel_core::db::Database;
use keel_core::models::{GoalKind, NewGoal};

use super::truncate;

pub fn cmd_goals_list(db: &Database, user_id: i64) -> Result<()> {
    let goals = db.list_goals(user_id, None)?;

    if goals.is_empty() {
        println!("No goals yet. Add one with: keel goals add \"Emergency fund\" --target 5000");
        return Ok(());
    }

    println!();
    println!(
        "   {:>4} │ {:20} │ {:18} │ {:>10} │ {:>10} │ {:10} │ {}",
        "ID", "Name", "Kind", "Target", "Current", "Deadline", "Status"
    );
    println!("   ─────┼──────────────────────┼────────────────────┼────────────┼────────────┼────────────┼────────");
    for goal in &goals {
        println!(
            "   {:>4} │ {:20} │ {:18} │ {:>10.2} │ {:>10.2} │ {:10} │ {}",
            goal.id,
            truncate(&goal.name, 20),
            goal.kind.as_str(),
            goal.target_amount,
            goal.current_amount,
            goal.deadline
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            goal.status.as_str()
        );
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_goals_add(
    db: &Database,
    user_id: i64,
    name: &str,
    kind: &str,
    target: f64,
    current: f64,
    reserve: f64,
    deadline: Option<&str>,
) -> Result<()> {
    let kind: GoalKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let deadline = deadline
        .map(|d| super::parse_date_arg(Some(d)))
        .transpose()?;

    let id = db.insert_goal(&NewGoal {
        user_id,
        name: name.to_string(),
        kind,
        target_amount: target,
        current_amount: current,
        monthly_reserve: reserve,
        deadline,
    })?;

    println!("✅ Goal '{}' created (#{})", name, id);
    Ok(())
}

pub fn cmd_limits_list(db: &Database, user_id: i64) -> Result<()> {
    let limits = db.list_category_limits(user_id)?;

    if limits.is_empty() {
        println!("No category limits yet. Set one with: keel limits set Dining 400");
        return Ok(());
    }

    println!();
    for limit in &limits {
        println!("   {:20} {:>10.2}/month", limit.category, limit.monthly_limit);
    }

    Ok(())
}

pub fn cmd_limits_set(db: &Database, user_id: i64, category: &str, amount: f64) -> Result<()> {
    if amount <= 0.0 {
        anyhow::bail!("Limit must be positive");
    }

    db.ensure_category(category)?;
    db.set_category_limit(user_id, category, amount)?;
    println!("✅ Limit for {} set to {:.2}/month", category, amount);
    Ok(())
}
