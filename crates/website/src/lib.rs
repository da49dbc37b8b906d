//! HTTP endpoints for map rastering, routing and location search.
//!
//! All state is built before the server starts and is only read afterwards,
//! so it is shared between workers without locking.

use std::path::PathBuf;

use actix_files as fs;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{debug, info, warn};
use rasterer::{Bounds, Rasterer};
use roadgraph::RoadGraph;
use serde::{Deserialize, Serialize};

/// URL prefix under which tile images are served.
pub const IMAGE_PREFIX: &str = "img/";

pub struct AppState {
    pub graph: RoadGraph,
    pub rasterer: Rasterer,
}

#[derive(Debug, Deserialize)]
pub struct RasterParams {
    pub ullon: f64,
    pub ullat: f64,
    pub lrlon: f64,
    pub lrlat: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RasterResponse {
    pub render_grid: Option<Vec<Vec<String>>>,
    pub raster_ul_lon: Option<f64>,
    pub raster_ul_lat: Option<f64>,
    pub raster_lr_lon: Option<f64>,
    pub raster_lr_lat: Option<f64>,
    pub depth: Option<usize>,
    pub query_success: bool,
}

#[derive(Debug, Deserialize)]
pub struct RouteParams {
    pub start_lon: f64,
    pub start_lat: f64,
    pub end_lon: f64,
    pub end_lat: f64,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteResponse {
    pub route: Vec<i64>,
    pub coordinates: Vec<[f64; 2]>,
    pub distance: Option<f64>,
    pub query_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TermParams {
    pub term: String,
}

pub fn raster_response(state: &AppState, params: &RasterParams) -> RasterResponse {
    let query = Bounds::new(params.ullon, params.ullat, params.lrlon, params.lrlat);
    debug!("Raster request {:?} at {}x{}", query, params.w, params.h);

    match state.rasterer.rasterize(&query, params.w) {
        Ok(result) => RasterResponse {
            render_grid: Some(result.render_grid(IMAGE_PREFIX, "png")),
            raster_ul_lon: Some(result.bounds.ullon),
            raster_ul_lat: Some(result.bounds.ullat),
            raster_lr_lon: Some(result.bounds.lrlon),
            raster_lr_lat: Some(result.bounds.lrlat),
            depth: Some(result.depth),
            query_success: true,
        },
        Err(e) => {
            debug!("Raster request failed: {}", e);
            RasterResponse::default()
        }
    }
}

pub fn route_response(state: &AppState, params: &RouteParams) -> RouteResponse {
    let coords = [params.start_lon, params.start_lat, params.end_lon, params.end_lat];
    if !coords.iter().all(|c| c.is_finite()) {
        warn!("Route request {:?} has non-finite coordinates", params);
        return RouteResponse {
            error: Some("coordinates must be finite numbers".to_string()),
            ..RouteResponse::default()
        };
    }

    let graph = &state.graph;
    let found = router::route(graph, params.start_lon, params.start_lat, params.end_lon, params.end_lat)
        .and_then(|path| {
            let coordinates = path
                .iter()
                .map(|&v| Ok([graph.lon(v)?, graph.lat(v)?]))
                .collect::<Result<Vec<_>, roadgraph::GraphError>>()?;
            let distance = router::path_length(graph, &path)?;
            Ok((path, coordinates, distance))
        });

    match found {
        Ok((route, coordinates, distance)) => RouteResponse {
            route,
            coordinates,
            distance: Some(distance),
            query_success: true,
            error: None,
        },
        Err(e) => {
            warn!("Route request {:?} failed: {}", params, e);
            RouteResponse {
                error: Some(e.to_string()),
                ..RouteResponse::default()
            }
        }
    }
}

async fn raster(state: web::Data<AppState>, params: web::Query<RasterParams>) -> impl Responder {
    HttpResponse::Ok().json(raster_response(&state, &params))
}

async fn route(state: web::Data<AppState>, params: web::Query<RouteParams>) -> impl Responder {
    HttpResponse::Ok().json(route_response(&state, &params))
}

async fn search(state: web::Data<AppState>, params: web::Query<TermParams>) -> impl Responder {
    HttpResponse::Ok().json(state.graph.locations_by_name(&params.term))
}

async fn autocomplete(state: web::Data<AppState>, params: web::Query<TermParams>) -> impl Responder {
    HttpResponse::Ok().json(state.graph.keys_with_prefix(&params.term))
}

/// Registers the query endpoints. Tile images are mounted separately by
/// [`serve`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/raster", web::get().to(raster))
        .route("/route", web::get().to(route))
        .route("/search", web::get().to(search))
        .route("/autocomplete", web::get().to(autocomplete));
}

pub async fn serve(state: AppState, addr: &str, tiles_dir: PathBuf) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!("Serving map at http://{} with tiles from {:?}", addr, tiles_dir);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(configure)
            .service(fs::Files::new("/img", tiles_dir.clone()).use_last_modified(true))
    })
    .bind(addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use rasterer::RasterConfig;
    use serde_json::Value;

    fn test_state() -> AppState {
        let mut graph = RoadGraph::new();
        for (id, lon, lat) in [(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 2.0, 0.0), (10, 5.0, 5.0), (11, 6.0, 5.0)] {
            graph.add_vertex(id, lon, lat).unwrap();
        }
        graph.add_way_sequence(&[1, 2, 3]).unwrap();
        graph.add_edge(10, 11).unwrap();
        graph.set_name(2, "Oak Street").unwrap();
        graph.add_name("Oakland Avenue");
        graph.finalize_and_clean();

        let rasterer = Rasterer::new(RasterConfig {
            root: Bounds::new(-10.0, 10.0, 10.0, -10.0),
            max_depth: 3,
            tile_size: 256,
        })
        .unwrap();

        AppState { graph, rasterer }
    }

    #[actix_web::test]
    async fn test_raster_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/raster?ullon=-10&ullat=10&lrlon=0&lrlat=0&w=256&h=256")
            .to_request();
        let body: RasterResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.query_success);
        assert_eq!(body.render_grid, Some(vec![vec!["img/1.png".to_string()]]));
        assert_eq!(body.depth, Some(2));
        assert_eq!(body.raster_ul_lon, Some(-10.0));
        assert_eq!(body.raster_lr_lat, Some(0.0));
    }

    #[actix_web::test]
    async fn test_raster_failure_is_flagged() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/raster?ullon=20&ullat=30&lrlon=40&lrlat=20&w=256&h=256")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["query_success"], Value::Bool(false));
        assert!(body["render_grid"].is_null());
        assert!(body["depth"].is_null());
    }

    #[actix_web::test]
    async fn test_route_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/route?start_lon=0.1&start_lat=0.1&end_lon=1.9&end_lat=-0.1")
            .to_request();
        let body: RouteResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.query_success);
        assert_eq!(body.route, vec![1, 2, 3]);
        assert_eq!(body.coordinates, vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(body.distance, Some(2.0));
        assert_eq!(body.error, None);
    }

    #[actix_web::test]
    async fn test_route_between_components_fails() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/route?start_lon=0&start_lat=0&end_lon=6&end_lat=5")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["query_success"], Value::Bool(false));
        assert!(body["error"].as_str().unwrap().contains("No path"));
        assert_eq!(body["route"], Value::Array(vec![]));
    }

    #[actix_web::test]
    async fn test_route_rejects_nan_coordinates() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/route?start_lon=NaN&start_lat=0&end_lon=2&end_lat=0")
            .to_request();
        let body: RouteResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.query_success);
        assert!(body.route.is_empty());
        assert!(body.error.unwrap().contains("finite"));
    }

    #[::core::prelude::v1::test]
    fn test_route_rejects_infinite_coordinates() {
        let state = test_state();
        let params = RouteParams {
            start_lon: 0.0,
            start_lat: 0.0,
            end_lon: f64::INFINITY,
            end_lat: 0.0,
        };
        let response = route_response(&state, &params);
        assert!(!response.query_success);
        assert_eq!(response.distance, None);
    }

    #[actix_web::test]
    async fn test_search_and_autocomplete() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/search?term=oak%20street").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let found = body.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], 2);
        assert_eq!(found[0]["name"], "Oak Street");

        let req = test::TestRequest::get().uri("/autocomplete?term=OAK").to_request();
        let names: Vec<String> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(names, vec!["Oak Street", "Oakland Avenue"]);

        let req = test::TestRequest::get().uri("/search?term=pine").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, Value::Array(vec![]));
    }
}
