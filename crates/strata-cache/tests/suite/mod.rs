mod ast_cache;
