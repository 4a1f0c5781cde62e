//! Send/Sync guarantees for the public client types.

use rstest::rstest;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use tsdb_client::{
    ClientError, Meter, SharedSocketClient, SocketClient, SocketClientBuilder,
    socket_client::HostSelector,
};

#[rstest]
fn client_can_move_between_threads() {
    assert_impl_all!(SocketClient: Send);
    assert_impl_all!(SocketClientBuilder: Send);
    assert_impl_all!(HostSelector: Send, Sync);
    assert_not_impl_any!(SocketClient: Clone);
}

#[rstest]
fn shared_client_is_send_sync() {
    assert_impl_all!(SharedSocketClient: Send, Sync, Clone);
}

#[rstest]
fn values_and_errors_are_send_sync() {
    assert_impl_all!(Meter: Send, Sync);
    assert_impl_all!(ClientError: Send, Sync);
}
