//! Instrumentation macros.
//!
//! Arguments are written as `key => value` pairs, so a trailing key with no
//! value does not parse; a malformed argument list can never reach the
//! queue.

/// Build an ordered `(String, String)` argument list from `key => value`
/// pairs.
#[macro_export]
macro_rules! trace_args {
    () => {
        ::std::vec::Vec::<(::std::string::String, ::std::string::String)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$(($key.to_string(), $value.to_string())),+]
    };
}

/// Trace the rest of the enclosing block as a named scope.
///
/// The scope closes when the enclosing block exits, on every exit path.
#[macro_export]
macro_rules! trace_scope {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {
        #[allow(unused_mut)]
        let mut _selftrace_scope = $tracer.scope($name);
        $(_selftrace_scope.add_arg($key, $value);)*
    };
}

/// Trace the rest of the enclosing function as a scope named after it.
#[macro_export]
macro_rules! trace_func {
    ($tracer:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::trace_scope!($tracer, $crate::__function_name!() $(, $key => $value)*);
    };
}

/// Emit an instant marker.
#[macro_export]
macro_rules! trace_instant {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut _selftrace_instant = $tracer.instant($name);
        $(_selftrace_instant.add_arg($key, $value);)*
    }};
}

/// Open a synchronous custom span; close it with [`trace_custom_end!`] using
/// the same name.
#[macro_export]
macro_rules! trace_custom_start {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        let _handle = $tracer.start_custom($name);
        $(_handle.add_arg($key, $value);)*
    }};
}

/// End a synchronous custom span, attaching args to its end record.
#[macro_export]
macro_rules! trace_custom_end {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        $(
            if let ::std::option::Option::Some(handle) = $tracer.get_custom($name) {
                handle.add_arg($key, $value);
            }
        )*
        $tracer.end_custom($name);
    }};
}

/// Open an asynchronous custom span; it may be closed from any thread with
/// [`trace_custom_async_end!`] using the same name.
#[macro_export]
macro_rules! trace_custom_async_start {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        let _handle = $tracer.start_custom_async($name);
        $(_handle.add_arg($key, $value);)*
    }};
}

/// End an asynchronous custom span, attaching args to its end record.
#[macro_export]
macro_rules! trace_custom_async_end {
    ($tracer:expr, $name:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        $(
            if let ::std::option::Option::Some(handle) = $tracer.get_custom_async($name) {
                handle.add_arg($key, $value);
            }
        )*
        $tracer.end_custom_async($name);
    }};
}

/// Name of the enclosing function, without the trailing closure path.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}
