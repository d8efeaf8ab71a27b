mod allocation;
mod kernel;
mod path_select;
mod storage_mapping;
mod topologies;
mod workload_spec;
