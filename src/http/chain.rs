//! Folding filter factories onto a terminal stage.

use std::sync::Arc;

use crate::execution::HttpExecutionStrategy;
use crate::http::filter::FilterFactory;

/// Wrap `terminal` in `factories`, first appended outermost.
///
/// Produces `f[0].create(f[1].create(... f[n-1].create(terminal)))`. An empty list
/// returns `terminal` itself.
pub fn build_chain<S: ?Sized>(factories: &[Arc<dyn FilterFactory<S>>], terminal: Arc<S>) -> Arc<S> {
    factories
        .iter()
        .rev()
        .fold(terminal, |next, factory| factory.create(next))
}

/// Merge every factory's requirement into `base`.
pub fn required_offloads<S: ?Sized>(
    factories: &[Arc<dyn FilterFactory<S>>],
    base: HttpExecutionStrategy,
) -> HttpExecutionStrategy {
    factories
        .iter()
        .fold(base, |strategy, factory| strategy.merge(factory.required_offloads()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::HttpServiceContext;
    use crate::http::filter::filter_fn;
    use crate::http::request::Request;
    use crate::http::response::ResponseFactory;
    use crate::http::service::HttpService;
    use crate::http::test_util::{get, ok_service, test_context};
    use proptest::prelude::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn tracing_filter(name: String, log: Log) -> Arc<dyn FilterFactory<dyn HttpService>> {
        Arc::new(filter_fn(
            move |ctx: &HttpServiceContext, request: Request, responses: &ResponseFactory, next: &Arc<dyn HttpService>| {
                log.lock().unwrap().push(format!("{name}>"));
                let log = log.clone();
                let name = name.clone();
                next.handle(ctx, request, responses).map(move |response| {
                    log.lock().unwrap().push(format!("<{name}"));
                    response
                })
            },
        ))
    }

    fn run(factories: &[Arc<dyn FilterFactory<dyn HttpService>>]) {
        let service = build_chain(factories, ok_service());
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime
            .block_on(service.handle(&test_context(), get("/"), &ResponseFactory))
            .unwrap();
    }

    #[test]
    fn empty_chain_returns_terminal() {
        let terminal = ok_service();
        let chained = build_chain::<dyn HttpService>(&[], terminal.clone());
        assert!(Arc::ptr_eq(&terminal, &chained));
    }

    #[test]
    fn requirements_merge_from_base() {
        let log: Log = Arc::default();
        let factories = vec![tracing_filter("a".into(), log)];
        assert_eq!(
            required_offloads(&factories, HttpExecutionStrategy::offload_none()),
            HttpExecutionStrategy::offload_all()
        );
        assert_eq!(
            required_offloads::<dyn HttpService>(&[], HttpExecutionStrategy::offload_none().with_send()),
            HttpExecutionStrategy::offload_none().with_send()
        );
    }

    proptest! {
        #[test]
        fn filters_run_in_append_order_and_unwind_in_reverse(count in 0usize..8) {
            let log: Log = Arc::default();
            let factories: Vec<_> = (0..count)
                .map(|i| tracing_filter(i.to_string(), log.clone()))
                .collect();
            run(&factories);

            let mut expected: Vec<String> = (0..count).map(|i| format!("{i}>")).collect();
            expected.extend((0..count).rev().map(|i| format!("<{i}")));
            prop_assert_eq!(log.lock().unwrap().clone(), expected);
        }
    }

    #[test]
    fn chain_is_built_without_invoking_filters() {
        let log: Log = Arc::default();
        let factories = vec![tracing_filter("a".into(), log.clone())];
        let _service = build_chain(&factories, ok_service());
        assert!(log.lock().unwrap().is_empty());
    }
}
