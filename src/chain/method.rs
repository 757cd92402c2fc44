//! Method trait and type definitions for attaching associated types to RPC
//! methods.

/// A remote SDK JSON RPC method.
pub trait Method {
    type Params;
    type Result;

    fn into_name(self) -> String;
}

macro_rules! impl_method {
    ($(
        $(#[$attr:meta])*
        pub struct $m:ident = $s:literal ($($p:ty),*) -> $r:ty;
    )*) => {$(
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $m;

        impl $crate::chain::method::Method for $m {
            type Params = ($($p,)*);
            type Result = $r;

            fn into_name(self) -> String {
                $s.to_owned()
            }
        }

        impl PartialEq<str> for $m {
            fn eq(&self, other: &str) -> bool {
                $s == other
            }
        }
    )*};
}

pub mod sdk {
    use crate::chain::types::{
        Authenticator, BuildRequest, OperationKind, PendingSubmission, TransactionReceipt,
        UnsignedTransaction,
    };

    impl_method! {
        /// Builds an unsigned transaction for a stream operation.
        pub struct BuildTransaction = "sdk_buildTransaction"
            (OperationKind, BuildRequest) -> UnsignedTransaction;

        /// Submits a transaction together with its authenticator.
        pub struct SubmitTransaction = "sdk_submitTransaction"
            (UnsignedTransaction, Authenticator) -> PendingSubmission;

        /// Waits for a submitted transaction to be committed.
        pub struct WaitForTransaction = "sdk_waitForTransaction"
            (String) -> TransactionReceipt;
    }
}
