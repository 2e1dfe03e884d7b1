pub mod sample_modpack;
