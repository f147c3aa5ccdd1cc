//! The C embedding boundary: the two exported model symbols, the opaque
//! matrix-API slot and the floating-point environment helper.
//!
//! A compiled model is a dynamic object exposing exactly two C symbols,
//! [`ALLOCATOR_SYMBOL`] and [`DEALLOCATOR_SYMBOL`]. The embedder resolves
//! both, installs the matrix API once, and drives the returned runtime
//! through its Rust surface. [`export_model!`] emits the pair for a model
//! type.

use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::runtime::Runtime;

/// Opaque table of numeric-kernel function pointers supplied by the
/// embedder. The core stores the pointer and hands it to model code; it
/// never inspects the table.
#[repr(C)]
pub struct MatApi {
    _opaque: [u8; 0],
}

/// Symbol name of the model allocation function.
pub const ALLOCATOR_SYMBOL: &str = "allocator";

/// Symbol name of the model deallocation function.
pub const DEALLOCATOR_SYMBOL: &str = "deallocator";

/// Signature behind [`ALLOCATOR_SYMBOL`]. Returns null on error.
pub type AllocatorFn = unsafe extern "C" fn(*const MatApi) -> *mut Runtime;

/// Signature behind [`DEALLOCATOR_SYMBOL`].
pub type DeallocatorFn = unsafe extern "C" fn(*mut Runtime);

static MATRIX_API: AtomicPtr<MatApi> = AtomicPtr::new(null_mut());

/// Install the process-wide matrix API. The embedder calls this exactly
/// once, before any model allocation.
pub fn set_matrix_api(api: *const MatApi) {
    MATRIX_API.store(api as *mut MatApi, Ordering::Release);
}

/// The installed matrix API, or null before [`set_matrix_api`].
pub fn matrix_api() -> *const MatApi {
    MATRIX_API.load(Ordering::Acquire)
}

/// The matrix API as an untyped pointer, for handing to model code.
pub fn matrix_api_ptr() -> *const c_void {
    matrix_api() as *const c_void
}

// `fesetround`/`FE_TONEAREST` live in <fenv.h>, which the `libc` crate does
// not bind. The value matches glibc/musl on all currently supported targets.
const FE_TONEAREST: libc::c_int = 0;

extern "C" {
    fn fesetround(mode: libc::c_int) -> libc::c_int;
}

/// Set the calling thread's rounding mode to round-to-nearest-even.
/// Workers call this on entry so deviate streams reproduce across
/// platforms.
pub fn set_round_to_nearest() -> bool {
    (unsafe { fesetround(FE_TONEAREST) }) == 0
}

/// Emit the `allocator`/`deallocator` C symbols for a model type.
///
/// The model type must implement [`Model`][crate::model::Model] and
/// `Default`. A panic during construction surfaces as a null return, per
/// the ABI contract.
///
/// ```ignore
/// model_host::export_model!(MyModel);
/// ```
#[macro_export]
macro_rules! export_model {
    ($model:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn allocator(
            matrix_api: *const $crate::ffi::MatApi,
        ) -> *mut $crate::runtime::Runtime {
            $crate::ffi::set_matrix_api(matrix_api);
            match ::std::panic::catch_unwind(|| {
                $crate::runtime::Runtime::new(<$model as ::std::default::Default>::default())
            }) {
                ::std::result::Result::Ok(runtime) => {
                    ::std::boxed::Box::into_raw(::std::boxed::Box::new(runtime))
                }
                ::std::result::Result::Err(_) => ::std::ptr::null_mut(),
            }
        }

        #[no_mangle]
        pub unsafe extern "C" fn deallocator(model: *mut $crate::runtime::Runtime) {
            if !model.is_null() {
                drop(::std::boxed::Box::from_raw(model));
            }
        }
    };
}
