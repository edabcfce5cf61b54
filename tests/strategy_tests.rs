// Integration tests for strategy state machines driven step by step

mod common;

use common::history_from_closes;
use grid_backtester::{
    run_backtest, GridStrategy, MomentumStrategy, PriceHistory, Side, Signal, StrategyConfig,
    TradingStrategy,
};

fn step<S: TradingStrategy>(strategy: &mut S, history: &PriceHistory, i: usize) -> Vec<Signal> {
    let window = history.up_to(i);
    let timestamp = window.latest_sample().unwrap().timestamp;
    strategy.get_signals(window, timestamp)
}

#[test]
fn test_grid_crossings_fire_once_per_crossing() {
    let history = history_from_closes(&[100.0, 95.0, 90.0, 95.0, 100.0]);
    let mut grid = GridStrategy::new(90.0, 110.0, 4, 10_000.0);

    // First observation fills the levels below the price: 90 and 95.
    let init = step(&mut grid, &history, 0);
    assert_eq!(init.len(), 2);
    assert!(init.iter().all(|s| s.side == Side::Buy && s.reason == "grid_init"));
    init.iter().for_each(|s| grid.apply(s));

    // 100 -> 95 -> 90 touches only filled levels.
    assert!(step(&mut grid, &history, 1).is_empty());
    assert!(step(&mut grid, &history, 2).is_empty());

    // 90 -> 95 crosses the filled 95 level upward.
    let sells = step(&mut grid, &history, 3);
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].side, Side::Sell);
    assert_eq!(sells[0].reason, "grid_sell");
    assert_eq!(sells[0].amount, grid.level_amount(95.0));
    sells.iter().for_each(|s| grid.apply(s));

    // 95 -> 100 crosses 100, which was never filled.
    assert!(step(&mut grid, &history, 4).is_empty());
}

#[test]
fn test_grid_path_through_engine() {
    let history = history_from_closes(&[100.0, 95.0, 90.0, 95.0, 100.0]);
    let result = run_backtest(&history, &StrategyConfig::grid(90.0, 110.0, 4), 10_000.0).unwrap();

    let sides: Vec<Side> = result.trades.iter().map(|t| t.side).collect();
    assert_eq!(sides, vec![Side::Buy, Side::Buy, Side::Sell]);
    assert_eq!(result.trades[2].timestamp, history.samples()[3].timestamp);
}

#[test]
fn test_momentum_needs_more_than_lookback_samples() {
    let mut momentum = MomentumStrategy::new(10_000.0, 3, 0.02);

    let flat = history_from_closes(&[100.0, 100.0]);
    for i in 0..flat.len() {
        assert!(step(&mut momentum, &flat, i).is_empty());
    }

    let surging = history_from_closes(&[100.0, 110.0, 121.0]);
    for i in 0..surging.len() {
        assert!(step(&mut momentum, &surging, i).is_empty());
    }
}

#[test]
fn test_momentum_enters_and_exits_through_engine() {
    let history = history_from_closes(&[100.0, 100.0, 100.0, 100.0, 110.0, 112.0, 100.0, 95.0]);
    let config = StrategyConfig::Momentum {
        lookback: 3,
        threshold: 0.02,
        stop_loss_pct: None,
    };
    let result = run_backtest(&history, &config, 1_000.0).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].side, Side::Buy);
    assert_eq!(result.trades[0].price, 110.0);
    assert_eq!(result.trades[0].reason, "momentum_up_10.00%");
    assert_eq!(result.trades[1].side, Side::Sell);
    assert_eq!(result.trades[1].amount, result.trades[0].amount);
    assert_eq!(result.final_state.position, 0.0);
}

#[test]
fn test_momentum_stop_loss_cuts_losing_position() {
    let history = history_from_closes(&[100.0, 100.0, 160.0, 150.0, 140.0, 130.0, 96.0]);
    let holding = StrategyConfig::Momentum {
        lookback: 2,
        threshold: 0.5,
        stop_loss_pct: None,
    };
    let stopped = StrategyConfig::Momentum {
        lookback: 2,
        threshold: 0.5,
        stop_loss_pct: Some(15.0),
    };

    let held = run_backtest(&history, &holding, 1_000.0).unwrap();
    assert_eq!(held.trades.len(), 1);
    assert!(held.final_state.position > 0.0);

    let result = run_backtest(&history, &stopped, 1_000.0).unwrap();
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].price, 160.0);
    assert_eq!(result.trades[1].side, Side::Sell);
    assert_eq!(result.trades[1].reason, "stop_loss");
    assert_eq!(result.trades[1].price, 130.0);
    assert_eq!(result.trades[1].amount, result.trades[0].amount);
    assert_eq!(result.final_state.position, 0.0);
    assert!(result.metrics.final_equity > held.metrics.final_equity);
}

#[test]
fn test_mean_reversion_round_trip_through_engine() {
    let history = history_from_closes(&[100.0, 100.0, 100.0, 80.0, 100.0]);
    let config = StrategyConfig::MeanReversion { ma_period: 4, std_threshold: 1.0 };
    let result = run_backtest(&history, &config, 1_000.0).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].side, Side::Buy);
    assert_eq!(result.trades[0].price, 80.0);
    assert_eq!(result.trades[1].side, Side::Sell);
    assert_eq!(result.trades[1].price, 100.0);
    assert_eq!(result.metrics.win_rate_pct, 100.0);
    assert!(result.metrics.final_equity > 1_000.0);
}

#[test]
fn test_improved_grid_stop_loss_liquidates() {
    let history = history_from_closes(&[100.0, 100.0, 100.0, 90.0, 70.0]);
    let config = StrategyConfig::ImprovedGrid {
        grid_num: 10,
        volatility_window: 3,
        stop_loss_pct: 15.0,
    };
    let result = run_backtest(&history, &config, 10_000.0).unwrap();

    assert!(result.trades.iter().any(|t| t.side == Side::Buy && t.price == 90.0));
    let last = result.trades.last().unwrap();
    assert_eq!(last.side, Side::Sell);
    assert_eq!(last.reason, "stop_loss");
    assert_eq!(last.price, 70.0);
    assert_eq!(result.final_state.position, 0.0);
}
