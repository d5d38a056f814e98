mod api;
mod health;

macros_utils::routes! {
    load health,
    load api,
}
