fn main() {
    sable::uci::run_loop();
}
