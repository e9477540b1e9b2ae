use gl_triangle::Variant;

fn main() {
    gl_triangle::app::main(Variant::Background);
}
