use nightshift_navigator::{
    config::{CvConfig, FusionWeightings, PathfindingConfig, ReroutingConfig},
    model::Position,
    NightShiftNavigator,
};

/// Demo fixture: a short three-node footpath, for manual smoke-testing.
/// Not part of the tested surface.
const DEMO_GEOJSON: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[-74.006, 40.7128], [-74.005, 40.7130], [-74.004, 40.7132]]
            }
        }
    ]
}"#;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let navigator = NightShiftNavigator::new(
        CvConfig::default(),
        FusionWeightings::default(),
        PathfindingConfig::default(),
        ReroutingConfig::default(),
    )?;

    let mut json = DEMO_GEOJSON.as_bytes().to_vec();
    let errors = navigator.ingest_geojson(&mut json)?;
    for error in &errors {
        tracing::warn!(field = %error.field, message = %error.message, "rejected GeoJSON feature");
    }

    let start = Position::new_deg(40.7128, -74.006);
    let goal = Position::new_deg(40.7132, -74.004);
    let route = navigator.compute_route(start, goal)?;

    tracing::info!(
        nodes = route.nodes.len(),
        total_distance = route.total_distance,
        total_cost = route.total_cost,
        estimated_time_seconds = route.estimated_time_seconds,
        "computed demo route"
    );

    navigator.shutdown();
    Ok(())
}
