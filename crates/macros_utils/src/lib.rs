//! Small macros shared by the HTTP front end.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generate `pub fn routes(cfg: &mut ServiceConfig)` for a routes module.
///
/// `route handler` registers an actix handler generated by a method macro
/// such as `#[get]`, and `load module` calls `module::routes` so route
/// modules can be nested.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     load api,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($($entries:tt)*) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $crate::__register_routes!(cfg; $($entries)*);
        }
    };
}

#[cfg(feature = "actix")]
#[doc(hidden)]
#[macro_export]
macro_rules! __register_routes {
    ($cfg:ident;) => {};
    ($cfg:ident; route $handler:ident $(, $($rest:tt)*)?) => {
        $cfg.service($handler);
        $crate::__register_routes!($cfg; $($($rest)*)?);
    };
    ($cfg:ident; load $module:ident $(, $($rest:tt)*)?) => {
        $module::routes($cfg);
        $crate::__register_routes!($cfg; $($($rest)*)?);
    };
}

#[cfg(all(test, feature = "actix"))]
mod tests {
    use actix_web::{App, HttpResponse, Responder, get, test};

    mod nested {
        use actix_web::{HttpResponse, Responder, get};

        crate::routes! {
            route pong,
        }

        #[get("/ping")]
        async fn pong() -> impl Responder {
            HttpResponse::Ok().body("pong")
        }
    }

    crate::routes! {
        route root,
        load nested,
    }

    #[get("/")]
    async fn root() -> impl Responder {
        HttpResponse::NoContent()
    }

    #[actix_web::test]
    async fn test_routes_registers_handlers_and_modules() {
        let app = test::init_service(App::new().configure(routes)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status().as_u16(), 204);

        let response = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(test::read_body(response).await, "pong");
    }
}
