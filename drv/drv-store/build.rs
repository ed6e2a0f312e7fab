fn main() {
    idol::server::build_server_support(
        "../../idl/store.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();
}
