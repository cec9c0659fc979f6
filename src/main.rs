fn main() {
    vaxcard_lib::run()
}
