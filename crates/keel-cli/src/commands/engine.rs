//! Engine command implementations: profile, score, decisions, simulations

use anyhow::Result;
use keel_core::db::Database;
use keel_core::models::{PaymentMethod, SimulationRequest, Verdict};
use keel_core::{DecisionEngine, EngineConfig, HealthScoreEngine, ProfileCalculator, Simulator};

use super::truncate;

pub fn cmd_profile(db: &Database, user_id: i64) -> Result<()> {
    let calc = ProfileCalculator::with_config(EngineConfig::load());
    let profile = calc.get_or_compute(db, user_id)?;

    println!();
    println!("💰 Financial Profile (user {})", user_id);
    println!("   ─────────────────────────────────────────");
    println!("   Avg monthly income:   {:>10.2}", profile.avg_monthly_income);
    println!("   Avg monthly expense:  {:>10.2}", profile.avg_monthly_expense);
    println!("   Fixed expenses:       {:>10.2}", profile.fixed_expense_estimate);
    println!("   Variable expenses:    {:>10.2}", profile.variable_expense_estimate);
    println!(
        "   Open installments:    {:>10.2} ({} due)",
        profile.open_installment_total, profile.open_installment_count
    );
    println!("   Expense volatility:   {:>10.2}", profile.expense_volatility);
    println!(
        "   History:              {} days over {} months",
        profile.days_of_history, profile.months_with_data
    );
    println!("   Confidence:           {}", profile.confidence);

    Ok(())
}

pub fn cmd_score(db: &Database, user_id: i64) -> Result<()> {
    let engine = HealthScoreEngine::with_config(EngineConfig::load());
    let snapshot = engine.current(db, user_id)?;

    println!();
    println!(
        "🩺 Health Score: {:.0}/100 ({})",
        snapshot.score, snapshot.classification
    );
    println!("   Factor              │ Weight │ Value  │ Points");
    println!("   ────────────────────┼────────┼────────┼───────");
    for factor in &snapshot.factors {
        println!(
            "   {:19} │ {:>6.0} │ {:>6.2} │ {:>6.2}",
            factor.name,
            factor.weight,
            factor.fraction,
            factor.points()
        );
    }

    Ok(())
}

pub fn cmd_check(
    db: &Database,
    user_id: i64,
    amount: f64,
    description: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let engine = DecisionEngine::with_config(EngineConfig::load());

    let fast = engine.should_use_fast_path(db, user_id, amount, false)?;
    let result = engine.evaluate_quick_spend(db, user_id, amount, description, category)?;

    let badge = match result.verdict {
        Verdict::Proceed => "🟢 Proceed",
        Verdict::Caution => "🟡 Caution",
        Verdict::Hold => "🔴 Hold",
    };

    println!();
    println!("{} for spending {:.2} now", badge, amount);
    println!(
        "   Free balance this month: {:.2}{}",
        result.free_balance,
        if fast { " (fast path)" } else { "" }
    );
    for vote in &result.layers {
        println!(
            "   [{:12}] {:7} {}",
            vote.layer.to_string(),
            vote.verdict.to_string(),
            vote.rationale
        );
    }

    if let Some(alert) = &result.limit_alert {
        println!(
            "   ⚠️  {} limit {:.2}: {:.2} spent, this would make it {:.2}",
            alert.category, alert.monthly_limit, alert.spent, alert.projected
        );
    }

    if let Some(impacts) = &result.goal_impacts {
        for impact in impacts {
            if impact.reserve_exceeded {
                println!(
                    "   ⚠️  Eats into the monthly reserve for '{}'",
                    impact.goal_name
                );
            } else if impact.delay_months > 0 {
                println!(
                    "   ⏳ '{}' delayed ~{} month(s); contribution {:.2} → {:.2}",
                    impact.goal_name,
                    impact.delay_months,
                    impact.required_before,
                    impact.required_after
                );
            }
        }
    }

    Ok(())
}

pub fn cmd_purchase(
    db: &Database,
    user_id: i64,
    amount: f64,
    description: &str,
    method: Option<&str>,
    installments: i64,
) -> Result<()> {
    let payment_method = method
        .map(|m| m.parse::<PaymentMethod>())
        .transpose()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let engine = DecisionEngine::with_config(EngineConfig::load());
    let evaluation =
        engine.evaluate_full_purchase(db, user_id, amount, description, payment_method, installments)?;

    println!();
    print!("{}", engine.render_report(&evaluation));

    Ok(())
}

pub fn cmd_simulate(
    db: &Database,
    user_id: i64,
    amount: f64,
    description: &str,
    method: &str,
    installments: i64,
    date: Option<&str>,
) -> Result<()> {
    let payment_method: PaymentMethod = method
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let planned_date = date.map(|d| super::parse_date_arg(Some(d))).transpose()?;

    let sim = Simulator::with_config(EngineConfig::load());
    let result = sim.simulate(
        db,
        user_id,
        &SimulationRequest {
            description: description.to_string(),
            amount,
            payment_method,
            installment_count: installments,
            card_id: None,
            planned_date,
        },
    )?;

    println!();
    println!(
        "🔮 12-month simulation: {} ({:.2}, {}{})",
        result.description,
        result.amount,
        result.payment_method,
        if result.installment_count > 1 {
            format!(", {}x", result.installment_count)
        } else {
            String::new()
        }
    );
    println!("   Month    │ Commitments │ Impact  │ Balance");
    println!("   ─────────┼─────────────┼─────────┼─────────");
    for month in &result.months {
        println!(
            "   {} │ {:>11.2} │ {:>7.2} │ {:>8.2}",
            month.month.format("%Y-%m"),
            month.commitments,
            month.purchase_impact,
            month.balance_with_purchase
        );
    }
    println!(
        "   Worst month: {:.2} → risk {} → {}",
        result.min_balance, result.risk, result.recommendation
    );
    if let Some(suggested) = result.suggested_installments {
        println!("   💡 {}x installments would hold up better", suggested);
    }

    Ok(())
}

pub fn cmd_simulations(db: &Database, user_id: i64) -> Result<()> {
    let sim = Simulator::with_config(EngineConfig::load());
    let history = sim.history(db, user_id)?;

    if history.is_empty() {
        println!("No simulations yet. Run one with: keel simulate 1200 --installments 12");
        return Ok(());
    }

    println!();
    println!(
        "   {:>4} │ {:19} │ {:>10} │ {:6} │ {:6} │ {}",
        "ID", "Description", "Amount", "Plan", "Risk", "Recommendation"
    );
    println!("   ─────┼─────────────────────┼────────────┼────────┼────────┼───────────────");
    for entry in &history {
        println!(
            "   {:>4} │ {:19} │ {:>10.2} │ {:>5}x │ {:6} │ {}",
            entry.id,
            truncate(&entry.description, 19),
            entry.amount,
            entry.installment_count,
            entry.risk.to_string(),
            entry.recommendation
        );
    }

    Ok(())
}

pub fn cmd_audit(db: &Database, user_id: i64, limit: i64) -> Result<()> {
    let rows = db.list_audit(user_id, limit)?;

    if rows.is_empty() {
        println!("No decisions recorded yet.");
        return Ok(());
    }

    println!();
    for row in &rows {
        println!(
            "   {} [{}] {:.2} → {}: {}",
            row.created_at.format("%Y-%m-%d %H:%M"),
            row.decision_type.as_str(),
            row.amount,
            row.outcome,
            truncate(&row.rationale, 80)
        );
    }

    Ok(())
}
