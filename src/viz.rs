//! Tier chart rendering with Plotters

use crate::data::HistoricalTable;
use crate::error::{Result, TierError};
use crate::model::{TierModel, TIER_NAMES};
use plotters::prelude::*;
use std::path::Path;

/// One color per price rank, cheapest first
const TIER_COLORS: [RGBColor; 4] = [GREEN, BLUE, MAGENTA, RED];

/// Scatter of every tiered listing: log10(price) on x, tier rank on y.
///
/// Rows without a price or tier are not drawn.
pub fn create_tier_chart(
    table: &HistoricalTable,
    model: &TierModel,
    output_path: impl AsRef<Path>,
) -> Result<()> {
    let groups = points_by_rank(table, model);
    let all_x: Vec<f64> = groups.iter().flatten().map(|&(x, _)| x).collect();
    let (x_min, x_max) = plot_bounds(&all_x).ok_or_else(|| {
        TierError::Plot("no tiered prices to draw".to_string())
    })?;

    draw_chart(&groups, (x_min, x_max), output_path.as_ref())
        .map_err(|e| TierError::Plot(e.to_string()))
}

fn draw_chart(
    groups: &[Vec<(f64, f64)>],
    (x_min, x_max): (f64, f64),
    output_path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Market Price Tiers", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, -0.5f64..(groups.len() as f64 - 0.5))?;

    chart
        .configure_mesh()
        .x_desc("log10(price USD)")
        .y_desc("Tier rank")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (rank, points) in groups.iter().enumerate() {
        let color = TIER_COLORS[rank % TIER_COLORS.len()];
        let label = TIER_NAMES.get(rank).copied().unwrap_or("Unknown");

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.mix(0.6).filled())),
            )?
            .label(format!("{} ({})", label, points.len()))
            .legend(move |(x, y)| Circle::new((x, y), 5, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Points grouped by tier price rank
fn points_by_rank(table: &HistoricalTable, model: &TierModel) -> Vec<Vec<(f64, f64)>> {
    let mut groups = vec![Vec::new(); model.n_tiers()];
    for row in table.rows() {
        let (Some(price), Some(tier)) = (row.price, row.tier) else {
            continue;
        };
        if price <= 0.0 {
            continue;
        }
        let Some(rank) = model.rank(tier) else {
            continue;
        };
        if let Some(group) = groups.get_mut(rank) {
            group.push((price.log10(), rank as f64));
        }
    }
    groups
}

/// X-axis range with a little padding, `None` for no points
fn plot_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let pad = ((max - min) * 0.05).max(0.1);
    Some((min - pad, max + pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_plot_bounds() {
        assert_eq!(plot_bounds(&[]), None);

        let (lo, hi) = plot_bounds(&[2.0, 4.0]).unwrap();
        assert!(lo < 2.0 && hi > 4.0);

        let (lo, hi) = plot_bounds(&[3.0]).unwrap();
        assert!(lo < 3.0 && hi > 3.0);
    }

    #[test]
    fn test_points_grouped_by_rank() {
        let model = TierModel::from_centroids(array![[1.0, 1.0], [-1.0, -1.0]]).unwrap();
        let table = HistoricalTable::new(
            vec![None, None, None],
            vec![Some(100.0), Some(10000.0), None],
            vec![Some(1), Some(0), Some(0)],
        )
        .unwrap();

        let groups = points_by_rank(&table, &model);
        assert_eq!(groups.len(), 2);
        // tier 1 holds the cheaper centroid
        assert_eq!(groups[0], vec![(2.0, 0.0)]);
        assert_eq!(groups[1], vec![(4.0, 1.0)]);
    }
}
